use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use lobby_common::{GameServer, RecentEndpointFilter, ServerRegistry, Transport};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::bytes::Regex;
use tokio::net::UdpSocket;
use uuid::Uuid;

use crate::constants::{GG2_BASE_UUID, GG2_LOBBY, LEGACY_MAGIC};
use crate::error::{log_drop, DropReason};
use crate::prober::{spawn_probe, ReachabilityProber};

/// `\A(!private!)?(?:\[([^\]]*)\])?\s*(.*?)\s*(?:\[(\d+)/(\d+)\])?(?: - (.*))?\z`,
/// `(?s)` so `.` also matches bytes a text regex would treat as line breaks —
/// info strings are opaque bytes, not necessarily valid text.
static INFO_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\A(!private!)?(?:\[([^\]]*)\])?\s*(.*?)\s*(?:\[(\d+)/(\d+)\])?(?: - (.*))?\z")
        .expect("static pattern is valid")
});

/// Interprets byte 0 of a legacy registration payload as either a one-byte
/// "simple version" (`GG2_BASE_UUID + version`) or, when it's `128`, a
/// literal 16-byte protocol UUID following it.
pub(crate) fn gg2_version_to_uuid(data: &[u8]) -> Uuid {
    if data[0] == 128 {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&data[1..17]);
        Uuid::from_bytes(bytes)
    } else {
        Uuid::from_u128(GG2_BASE_UUID.as_u128() + data[0] as u128)
    }
}

fn synthesize_server_id(ip: Ipv4Addr, port: u16) -> Uuid {
    let ip_u32 = u32::from_be_bytes(ip.octets());
    Uuid::from_u128(GG2_BASE_UUID.as_u128() + ((ip_u32 as u128) << 16) + port as u128)
}

fn parse_info(server: &mut GameServer, info: &[u8]) {
    let Some(caps) = INFO_PATTERN.captures(info) else {
        server.name = info.to_vec();
        return;
    };
    if caps.get(1).is_some() {
        server.passworded = true;
    }
    if let Some(map) = caps.get(2) {
        server.infos.insert(b"map".to_vec(), map.as_bytes().to_vec());
    }
    server.name = caps
        .get(3)
        .map(|m| m.as_bytes().to_vec())
        .unwrap_or_default();
    if let Some(players) = caps.get(4).and_then(|m| parse_ascii_u16(m.as_bytes())) {
        server.players = players;
    }
    if let Some(slots) = caps.get(5).and_then(|m| parse_ascii_u16(m.as_bytes())) {
        server.slots = slots;
    }
    if let Some(mod_tag) = caps.get(6) {
        let mod_bytes = mod_tag.as_bytes();
        if mod_bytes == b"OHU" {
            server.infos.insert(b"game".to_vec(), b"Orpheon's Hosting Utilities".to_vec());
            server.infos.insert(b"game_short".to_vec(), b"ohu".to_vec());
            server.infos.insert(
                b"game_url".to_vec(),
                b"http://www.ganggarrison.com/forums/index.php?topic=28839.0".to_vec(),
            );
        } else {
            server.infos.insert(b"game".to_vec(), mod_bytes.to_vec());
            if mod_bytes.len() <= 10 {
                server.infos.remove(b"game_short".as_slice());
            }
        }
    }
}

fn parse_ascii_u16(digits: &[u8]) -> Option<u16> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Parses one legacy registration datagram, returning the candidate server
/// and the port it should be probed on, or `None` for any malformed or
/// policy-rejected input (the caller is responsible for throttle checks).
fn parse_registration(data: &[u8], src_ip: Ipv4Addr, banned_ips: &HashSet<Ipv4Addr>) -> Option<GameServer> {
    let data = data.strip_prefix(&LEGACY_MAGIC[..])?;

    if data.is_empty() || (data[0] == 128 && data.len() < 17) {
        return None;
    }
    let protocol_id = gg2_version_to_uuid(data);
    let data = if data[0] == 128 { &data[17..] } else { &data[1..] };

    if data.len() < 3 {
        return None;
    }
    let port = u16::from_le_bytes([data[0], data[1]]);
    let infolen = data[2] as usize;
    let infostr = &data[3..];
    if infostr.len() != infolen {
        return None;
    }

    if banned_ips.contains(&src_ip) {
        return None;
    }

    let server_id = synthesize_server_id(src_ip, port);
    let mut server = GameServer::new(server_id, GG2_LOBBY, Transport::Tcp);
    server.ipv4_endpoint = Some((src_ip, port));
    server.infos.insert(b"protocol_id".to_vec(), protocol_id.as_bytes().to_vec());
    server
        .infos
        .insert(b"game".to_vec(), b"Legacy Gang Garrison 2 version or mod".to_vec());
    server.infos.insert(b"game_short".to_vec(), b"old".to_vec());
    parse_info(&mut server, infostr);

    Some(server)
}

pub struct LegacyRegHandler {
    pub registry: Arc<Mutex<ServerRegistry>>,
    pub throttle: Arc<Mutex<RecentEndpointFilter>>,
    pub banned_ips: Arc<HashSet<Ipv4Addr>>,
    pub prober: Arc<dyn ReachabilityProber>,
}

impl LegacyRegHandler {
    fn handle_datagram(&self, data: &[u8], src: SocketAddrV4) {
        if self.throttle.lock().check_and_record(*src.ip(), src.port()) {
            return;
        }
        match parse_registration(data, *src.ip(), &self.banned_ips) {
            Some(server) => spawn_probe(self.prober.clone(), self.registry.clone(), server),
            None => log_drop(DropReason::Malformed, &src.to_string()),
        }
    }

    pub async fn run(self, socket: UdpSocket) {
        let mut buf = [0u8; 2048];
        loop {
            let (len, src) = match socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(?err, "legacy udp recv failed");
                    continue;
                }
            };
            let std::net::SocketAddr::V4(src_v4) = src else {
                continue;
            };
            self.handle_datagram(&buf[..len], src_v4);
        }
    }
}
