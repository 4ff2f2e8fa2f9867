use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use lobby_common::{GameServer, PutOutcome, RecentEndpointFilter, ServerRegistry, Transport};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use uuid::Uuid;

use crate::constants::{NEWSTYLE_REG_PROTOCOL, NEWSTYLE_UNREG_PROTOCOL};
use crate::error::{log_drop, DropReason};
use crate::prober::{spawn_probe, ReachabilityProber};

/// Length of a register body (after the 16-byte sub-protocol prefix has
/// already been stripped by the caller): 16 server_id + 16 lobby_id +
/// 1 transport + 2 port + 2 slots + 2 players + 2 bots + 1 reserved +
/// 1 flags + 2 kv_count.
const REGISTER_BODY_LEN: usize = 16 + 16 + 1 + 2 + 2 + 2 + 2 + 1 + 1 + 2;
/// Length of an unregister body (after the sub-protocol prefix): server_id.
const UNREGISTER_BODY_LEN: usize = 16;

fn read_uuid(data: &[u8], offset: usize) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&data[offset..offset + 16]);
    Uuid::from_bytes(bytes)
}

fn parse_kv_table(mut data: &[u8], server: &mut GameServer) -> Option<()> {
    let kv_count = u16::from_be_bytes([data[0], data[1]]);
    data = &data[2..];
    for _ in 0..kv_count {
        let key_len = *data.first()? as usize;
        data = data.get(1..)?;
        let key = data.get(..key_len)?.to_vec();
        data = data.get(key_len..)?;
        let value_len = u16::from_be_bytes([*data.first()?, *data.get(1)?]) as usize;
        data = data.get(2..)?;
        let value = data.get(..value_len)?.to_vec();
        data = data.get(value_len..)?;
        server.infos.insert(key, value);
    }
    Some(())
}

/// `data` is the register datagram with the 16-byte sub-protocol UUID
/// already stripped.
fn parse_register(data: &[u8], src_ip: Ipv4Addr) -> Option<GameServer> {
    if data.len() < REGISTER_BODY_LEN {
        return None;
    }
    let server_id = read_uuid(data, 0);
    let lobby_id = read_uuid(data, 16);
    let transport = match data[32] {
        0 => Transport::Tcp,
        1 => Transport::Udp,
        _ => return None,
    };
    let port = u16::from_be_bytes([data[33], data[34]]);
    if port == 0 {
        return None;
    }
    let slots = u16::from_be_bytes([data[35], data[36]]);
    let players = u16::from_be_bytes([data[37], data[38]]);
    let bots = u16::from_be_bytes([data[39], data[40]]);
    // data[41] is reserved.
    let flags = data[42];

    let mut server = GameServer::new(server_id, lobby_id, transport);
    server.ipv4_endpoint = Some((src_ip, port));
    server.slots = slots;
    server.players = players;
    server.bots = bots;
    server.passworded = flags & 1 != 0;

    parse_kv_table(&data[43..], &mut server)?;
    let name = server.infos.remove(b"name".as_slice())?;
    server.name = name;

    Some(server)
}

/// `data` is the unregister datagram with the sub-protocol UUID stripped.
fn parse_unregister(data: &[u8]) -> Option<Uuid> {
    if data.len() != UNREGISTER_BODY_LEN {
        return None;
    }
    Some(read_uuid(data, 0))
}

pub struct NewStyleRegHandler {
    pub registry: Arc<Mutex<ServerRegistry>>,
    pub throttle: Arc<Mutex<RecentEndpointFilter>>,
    pub banned_ips: Arc<HashSet<Ipv4Addr>>,
    pub prober: Arc<dyn ReachabilityProber>,
}

impl NewStyleRegHandler {
    fn handle_datagram(&self, data: &[u8], src: SocketAddrV4) {
        if data.len() < 16 {
            return;
        }
        let sub_protocol = read_uuid(data, 0);

        let body = &data[16..];

        if sub_protocol == NEWSTYLE_UNREG_PROTOCOL {
            match parse_unregister(body) {
                Some(server_id) => self.registry.lock().remove(server_id),
                None => log_drop(DropReason::Malformed, &src.to_string()),
            }
            return;
        }

        if sub_protocol != NEWSTYLE_REG_PROTOCOL {
            return;
        }

        if self.throttle.lock().check_and_record(*src.ip(), src.port()) {
            return;
        }
        if self.banned_ips.contains(src.ip()) {
            log_drop(DropReason::PolicyDenied, &src.to_string());
            return;
        }

        let Some(server) = parse_register(body, *src.ip()) else {
            log_drop(DropReason::Malformed, &src.to_string());
            return;
        };

        match server.transport {
            Transport::Tcp => spawn_probe(self.prober.clone(), self.registry.clone(), server),
            Transport::Udp => {
                if self.registry.lock().put(server) == PutOutcome::Rejected {
                    log_drop(DropReason::PolicyDenied, &src.to_string());
                }
            }
        }
    }

    pub async fn run(self, socket: UdpSocket) {
        let mut buf = [0u8; 4096];
        loop {
            let (len, src) = match socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(?err, "newstyle udp recv failed");
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

#[cfg(test)]
mod tests {
    use super::*;

    fn register_datagram(server_id: Uuid, lobby_id: Uuid, transport: u8, port: u16, name: &str) -> Vec<u8> {
        let mut out = NEWSTYLE_REG_PROTOCOL.as_bytes().to_vec();
        out.extend_from_slice(server_id.as_bytes());
        out.extend_from_slice(lobby_id.as_bytes());
        out.push(transport);
        out.extend_from_slice(&port.to_be_bytes());
        out.extend_from_slice(&8u16.to_be_bytes());
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.push(0);
        out.push(0);
        let name_bytes = name.as_bytes();
        out.extend_from_slice(&1u16.to_be_bytes());
        out.push(b"name".len() as u8);
        out.extend_from_slice(b"name");
        out.extend_from_slice(&(name_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(name_bytes);
        out
    }

    #[test]
    fn parses_a_udp_transport_registration() {
        let sid = Uuid::new_v4();
        let lid = Uuid::new_v4();
        let datagram = register_datagram(sid, lid, 1, 12345, "Test Server");
        let server = parse_register(&datagram[16..], Ipv4Addr::new(127, 0, 0, 1)).unwrap();
        assert_eq!(server.server_id, sid);
        assert_eq!(server.lobby_id, lid);
        assert_eq!(server.transport, Transport::Udp);
        assert_eq!(server.name, b"Test Server");
        assert_eq!(server.slots, 8);
        assert_eq!(server.players, 2);
    }

    #[test]
    fn missing_name_is_rejected() {
        let sid = Uuid::new_v4();
        let lid = Uuid::new_v4();
        let mut datagram = NEWSTYLE_REG_PROTOCOL.as_bytes().to_vec();
        datagram.extend_from_slice(sid.as_bytes());
        datagram.extend_from_slice(lid.as_bytes());
        datagram.push(1);
        datagram.extend_from_slice(&1u16.to_be_bytes());
        datagram.extend_from_slice(&0u16.to_be_bytes());
        datagram.extend_from_slice(&0u16.to_be_bytes());
        datagram.extend_from_slice(&0u16.to_be_bytes());
        datagram.push(0);
        datagram.push(0);
        datagram.extend_from_slice(&0u16.to_be_bytes());
        assert!(parse_register(&datagram[16..], Ipv4Addr::new(127, 0, 0, 1)).is_none());
    }

    #[test]
    fn zero_port_is_rejected() {
        let datagram = register_datagram(Uuid::new_v4(), Uuid::new_v4(), 1, 0, "x");
        assert!(parse_register(&datagram[16..], Ipv4Addr::new(127, 0, 0, 1)).is_none());
    }

    #[test]
    fn unregister_requires_exact_length() {
        let mut datagram = NEWSTYLE_UNREG_PROTOCOL.as_bytes().to_vec();
        datagram.extend_from_slice(Uuid::new_v4().as_bytes());
        assert!(parse_unregister(&datagram[16..]).is_some());
        datagram.push(0);
        assert!(parse_unregister(&datagram[16..]).is_none());
    }

    #[test]
    fn passworded_flag_bit_is_read() {
        let sid = Uuid::new_v4();
        let lid = Uuid::new_v4();
        let mut datagram = register_datagram(sid, lid, 0, 80, "Srv");
        // flip the flags byte (offset 42 within the post-header slice == 58 overall)
        datagram[58] = 1;
        let server = parse_register(&datagram[16..], Ipv4Addr::new(1, 2, 3, 4)).unwrap();
        assert!(server.passworded);
    }
}
