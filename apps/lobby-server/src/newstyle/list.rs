use std::sync::Arc;

use lobby_common::{GameServer, ServerRegistry};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use uuid::Uuid;

use crate::constants::{CONNECTION_TIMEOUT, NEWSTYLE_LIST_PROTOCOL};
use crate::error::{log_drop, DropReason};

fn format_kv(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + key.len() + 2 + value.len());
    out.push(key.len().min(255) as u8);
    out.extend_from_slice(&key[..key.len().min(255)]);
    let value = &value[..value.len().min(u16::MAX as usize)];
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    out
}

fn format_server_record(server: &GameServer) -> Vec<u8> {
    let (ipv4_port, ipv4_ip) = server
        .ipv4_endpoint
        .map(|(ip, port)| (port, ip.octets()))
        .unwrap_or((0, [0; 4]));
    let (ipv6_port, ipv6_ip) = server
        .ipv6_endpoint
        .map(|(ip, port)| (port, ip.octets()))
        .unwrap_or((0, [0; 16]));

    let mut out = Vec::new();
    out.push(match server.transport {
        lobby_common::Transport::Tcp => 0,
        lobby_common::Transport::Udp => 1,
    });
    out.extend_from_slice(&ipv4_port.to_be_bytes());
    out.extend_from_slice(&ipv4_ip);
    out.extend_from_slice(&ipv6_port.to_be_bytes());
    out.extend_from_slice(&ipv6_ip);
    out.extend_from_slice(&server.slots.to_be_bytes());
    out.extend_from_slice(&server.players.to_be_bytes());
    out.extend_from_slice(&server.bots.to_be_bytes());
    out.extend_from_slice(&(server.passworded as u16).to_be_bytes());

    // `infos` never carries `name` (the register handler pulls it out into
    // `server.name`); the wire record re-adds it so every list entry is
    // self-contained.
    let kv_count = (server.infos.len() + 1) as u16;
    out.extend_from_slice(&kv_count.to_be_bytes());
    out.extend_from_slice(&format_kv(b"name", &server.name));
    for (key, value) in &server.infos {
        out.extend_from_slice(&format_kv(key, value));
    }
    out
}

fn build_reply(registry: &Mutex<ServerRegistry>, lobby_id: Uuid) -> Vec<u8> {
    let servers = registry.lock().servers_in_lobby(lobby_id);
    let mut out = Vec::new();
    out.extend_from_slice(&(servers.len() as u32).to_be_bytes());
    for server in &servers {
        let record = format_server_record(server);
        out.extend_from_slice(&(record.len() as u32).to_be_bytes());
        out.extend_from_slice(&record);
    }
    out
}

/// Reads exactly 32 bytes (16-byte list-protocol UUID + 16-byte lobby UUID).
/// Any read that pushes the total past 32 bytes, in one chunk or several, is
/// a protocol violation — stop reading and don't reply.
async fn read_request(stream: &mut TcpStream) -> Option<Uuid> {
    let mut buf = Vec::with_capacity(32);
    loop {
        let mut chunk = [0u8; 64];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() >= 32 {
            if buf.len() == 32 && buf[..16] == NEWSTYLE_LIST_PROTOCOL.as_bytes()[..] {
                let mut lobby_bytes = [0u8; 16];
                lobby_bytes.copy_from_slice(&buf[16..32]);
                return Some(Uuid::from_bytes(lobby_bytes));
            }
            return None;
        }
    }
}

pub async fn handle_connection(mut stream: TcpStream, registry: Arc<Mutex<ServerRegistry>>) {
    let result = timeout(CONNECTION_TIMEOUT, async {
        let lobby_id = read_request(&mut stream).await?;
        let reply = build_reply(&registry, lobby_id);
        stream.write_all(&reply).await.ok()?;
        Some(())
    })
    .await;
    if !matches!(result, Ok(Some(()))) {
        log_drop(DropReason::ProtocolViolation, "newstyle list");
    }
}
