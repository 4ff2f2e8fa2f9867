use std::sync::Arc;

use lobby_common::{GameServer, ServerRegistry};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use uuid::Uuid;

use crate::constants::{CONNECTION_TIMEOUT, GG2_LOBBY};
use crate::error::{log_drop, DropReason};

fn format_server_data(server: &GameServer) -> Option<Vec<u8>> {
    let (ip, port) = server.ipv4_endpoint?;
    let mut info = Vec::new();
    if server.passworded {
        info.extend_from_slice(b"!private!");
    }
    if let Some(map) = server.infos.get(b"map".as_slice()) {
        info.push(b'[');
        info.extend_from_slice(map);
        info.extend_from_slice(b"] ");
    }
    info.extend_from_slice(&server.name);
    if server.bots == 0 {
        info.extend_from_slice(format!(" [{}/{}]", server.players, server.slots).as_bytes());
    } else {
        info.extend_from_slice(
            format!(" [{}+{}/{}]", server.players, server.bots, server.slots).as_bytes(),
        );
    }
    info.truncate(255);

    let mut out = Vec::with_capacity(1 + info.len() + 6);
    out.push(info.len() as u8);
    out.extend_from_slice(&info);
    out.extend_from_slice(&ip.octets());
    out.extend_from_slice(&port.to_le_bytes());
    Some(out)
}

fn build_reply(registry: &Mutex<ServerRegistry>, protocol_id: Uuid) -> Vec<u8> {
    let servers = registry.lock().servers_in_lobby(GG2_LOBBY);
    let rows: Vec<Vec<u8>> = servers
        .iter()
        .filter(|s| s.infos.get(b"protocol_id".as_slice()).map(Vec::as_slice) == Some(protocol_id.as_bytes()))
        .filter_map(format_server_data)
        .take(255)
        .collect();

    let mut out = Vec::new();
    out.push(rows.len() as u8);
    for row in rows {
        out.extend_from_slice(&row);
    }
    out
}

/// Reads the incremental simple-version-or-explicit-UUID query, matching the
/// reference implementation's buffering rule: reply as soon as either the
/// first byte isn't `128`, or exactly 17 bytes have accumulated. More than
/// 17 bytes at any point is a protocol violation — close with no reply.
async fn read_query(stream: &mut TcpStream) -> Option<Uuid> {
    let mut buf = Vec::with_capacity(17);
    loop {
        let mut chunk = [0u8; 64];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > 17 {
            return None;
        }
        if buf[0] != 128 || buf.len() == 17 {
            return Some(crate::legacy::reg::gg2_version_to_uuid(&buf));
        }
    }
}

pub async fn handle_connection(mut stream: TcpStream, registry: Arc<Mutex<ServerRegistry>>) {
    let result = timeout(CONNECTION_TIMEOUT, async {
        let protocol_id = read_query(&mut stream).await?;
        let reply = build_reply(&registry, protocol_id);
        stream.write_all(&reply).await.ok()?;
        Some(())
    })
    .await;
    if !matches!(result, Ok(Some(()))) {
        log_drop(DropReason::ProtocolViolation, "legacy query");
    }
}
