use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use uuid::Uuid;

/// Transport a new-style server announced itself over. Legacy registrations
/// are always `Tcp` (the legacy protocol predates the UDP-server variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

/// One of a server's two possible reachable addresses, used as an index key
/// so the registry can reject a registration that tries to steal another
/// server's endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    V4(Ipv4Addr, u16),
    V6(Ipv6Addr, u16),
}

/// A single announced game server. Constructed by a registration parser,
/// possibly merged with a pre-existing record's endpoints on commit (see
/// `ServerRegistry::put`), then immutable for the rest of its lifetime —
/// any update is a brand new `GameServer` replacing the old one wholesale.
#[derive(Debug, Clone)]
pub struct GameServer {
    pub server_id: Uuid,
    pub lobby_id: Uuid,
    pub transport: Transport,
    pub ipv4_endpoint: Option<(Ipv4Addr, u16)>,
    pub ipv6_endpoint: Option<(Ipv6Addr, u16)>,
    pub name: Vec<u8>,
    pub slots: u16,
    pub players: u16,
    pub bots: u16,
    pub passworded: bool,
    pub infos: HashMap<Vec<u8>, Vec<u8>>,
}

impl GameServer {
    pub fn new(server_id: Uuid, lobby_id: Uuid, transport: Transport) -> Self {
        Self {
            server_id,
            lobby_id,
            transport,
            ipv4_endpoint: None,
            ipv6_endpoint: None,
            name: Vec::new(),
            slots: 0,
            players: 0,
            bots: 0,
            passworded: false,
            infos: HashMap::new(),
        }
    }

    pub fn endpoints(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.ipv4_endpoint
            .map(|(ip, port)| Endpoint::V4(ip, port))
            .into_iter()
            .chain(self.ipv6_endpoint.map(|(ip, port)| Endpoint::V6(ip, port)))
    }

    pub fn has_endpoint(&self) -> bool {
        self.ipv4_endpoint.is_some() || self.ipv6_endpoint.is_some()
    }
}
