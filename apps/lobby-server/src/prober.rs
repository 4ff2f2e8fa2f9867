use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use async_trait::async_trait;
use lobby_common::{GameServer, ServerRegistry};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::constants::CONNECTION_TIMEOUT;
use crate::error::{log_drop, DropReason};

/// A one-shot outbound reachability check. No data is exchanged — a
/// successful TCP connect is the entire proof of liveness, mirroring
/// `SimpleTCPReachabilityCheck` in the reference implementation.
///
/// Abstracted behind a trait purely so tests can substitute a fake that
/// never opens a real socket.
#[async_trait]
pub trait ReachabilityProber: Send + Sync + 'static {
    async fn is_reachable(&self, addr: SocketAddrV4) -> bool;
}

pub struct TcpProber;

#[async_trait]
impl ReachabilityProber for TcpProber {
    async fn is_reachable(&self, addr: SocketAddrV4) -> bool {
        match timeout(CONNECTION_TIMEOUT, TcpStream::connect(SocketAddr::V4(addr))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            _ => false,
        }
    }
}

/// Probes `server`'s ipv4 endpoint in the background; on success, commits it
/// to the registry. Never blocks the caller — this is always `tokio::spawn`ed
/// so a slow or unreachable candidate can't stall the UDP receive loop.
pub fn spawn_probe(
    prober: Arc<dyn ReachabilityProber>,
    registry: Arc<Mutex<ServerRegistry>>,
    server: GameServer,
) {
    tokio::spawn(async move {
        let Some((ip, port)) = server.ipv4_endpoint else {
            return;
        };
        let addr = SocketAddrV4::new(ip, port);
        if prober.is_reachable(addr).await {
            registry.lock().put(server);
        } else {
            log_drop(DropReason::Unreachable, &addr.to_string());
        }
    });
}

/// Fake probers for exercising the registration handlers without opening
/// real sockets — used by both this crate's unit tests and its `tests/`
/// integration binary.
pub mod test_support {
    use super::*;

    pub struct AlwaysReachable;

    #[async_trait]
    impl ReachabilityProber for AlwaysReachable {
        async fn is_reachable(&self, _addr: SocketAddrV4) -> bool {
            true
        }
    }

    pub struct NeverReachable;

    #[async_trait]
    impl ReachabilityProber for NeverReachable {
        async fn is_reachable(&self, _addr: SocketAddrV4) -> bool {
            false
        }
    }
}
