use std::time::Duration;

use uuid::{uuid, Uuid};

/// How long a committed server record stays live without being refreshed.
pub const SERVER_EXPIRATION: Duration = Duration::from_secs(70);

/// How long a source `(ip, port)` is throttled after a registration datagram.
pub const REGISTRATION_THROTTLE: Duration = Duration::from_secs(10);

/// Hard timeout for an outbound reachability probe and for the total
/// lifetime of an inbound query connection.
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

pub const GG2_BASE_UUID: Uuid = uuid!("dea41970-4cea-a588-df40-62faef6f1738");
pub const GG2_LOBBY: Uuid = uuid!("1ccf16b1-436d-856f-504d-cc1af306aaa7");

pub const NEWSTYLE_LIST_PROTOCOL: Uuid = uuid!("297d0df4-430c-bf61-640a-640897eaef57");
pub const NEWSTYLE_REG_PROTOCOL: Uuid = uuid!("b5dae2e8-424f-9ed0-0fcb-8c21c7ca1352");
pub const NEWSTYLE_UNREG_PROTOCOL: Uuid = uuid!("488984ac-45dc-86e1-9901-98dd1c01c064");

pub const LEGACY_MAGIC: [u8; 6] = [4, 8, 15, 16, 23, 42];

/// Display names for well-known lobbies on the status page. Purely cosmetic
/// — an unrecognized lobby UUID still appears, just with a generic label.
pub fn known_lobby_name(lobby_id: Uuid) -> Option<&'static str> {
    if lobby_id == GG2_LOBBY {
        Some("Gang Garrison Lobby")
    } else if lobby_id == uuid!("0e29560e-443a-93a3-e15e-7bd072df7506") {
        Some("PyGG2 Testing Lobby")
    } else if lobby_id == uuid!("4fd0319b-5868-4f24-8b77-568cbb18fde9") {
        Some("Vanguard Lobby")
    } else {
        None
    }
}
