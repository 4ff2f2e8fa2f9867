pub mod config;
pub mod constants;
pub mod error;
pub mod legacy;
pub mod newstyle;
pub mod prober;
pub mod status;

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Arc;

use lobby_common::{RecentEndpointFilter, ServerRegistry};
use parking_lot::Mutex;
use tokio::net::{TcpListener, UdpSocket};

use config::Config;
use constants::{REGISTRATION_THROTTLE, SERVER_EXPIRATION};
use legacy::reg::LegacyRegHandler;
use newstyle::reg::NewStyleRegHandler;
use prober::{ReachabilityProber, TcpProber};

/// Everything the five listener tasks share.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Mutex<ServerRegistry>>,
    pub throttle: Arc<Mutex<RecentEndpointFilter>>,
    pub banned_ips: Arc<HashSet<Ipv4Addr>>,
    pub prober: Arc<dyn ReachabilityProber>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self::with_prober(config, Arc::new(TcpProber))
    }

    pub fn with_prober(config: &Config, prober: Arc<dyn ReachabilityProber>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(ServerRegistry::new(SERVER_EXPIRATION))),
            throttle: Arc::new(Mutex::new(RecentEndpointFilter::new(REGISTRATION_THROTTLE))),
            banned_ips: Arc::new(config.banned_ips.clone()),
            prober,
        }
    }
}

/// Binds the legacy UDP/TCP listeners and spawns their accept/receive loops.
/// Returns once both sockets are bound; the loops themselves run forever in
/// background tasks.
pub async fn spawn_legacy(state: &AppState, port: u16) -> std::io::Result<()> {
    let udp = UdpSocket::bind(("0.0.0.0", port)).await?;
    let reg_handler = LegacyRegHandler {
        registry: state.registry.clone(),
        throttle: state.throttle.clone(),
        banned_ips: state.banned_ips.clone(),
        prober: state.prober.clone(),
    };
    tokio::spawn(reg_handler.run(udp));

    let tcp = TcpListener::bind(("0.0.0.0", port)).await?;
    let registry = state.registry.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = tcp.accept().await else {
                continue;
            };
            let registry = registry.clone();
            tokio::spawn(legacy::query::handle_connection(stream, registry));
        }
    });

    Ok(())
}

/// Binds the new-style UDP/TCP listeners and spawns their loops.
pub async fn spawn_newstyle(state: &AppState, port: u16) -> std::io::Result<()> {
    let udp = UdpSocket::bind(("0.0.0.0", port)).await?;
    let reg_handler = NewStyleRegHandler {
        registry: state.registry.clone(),
        throttle: state.throttle.clone(),
        banned_ips: state.banned_ips.clone(),
        prober: state.prober.clone(),
    };
    tokio::spawn(reg_handler.run(udp));

    let tcp = TcpListener::bind(("0.0.0.0", port)).await?;
    let registry = state.registry.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = tcp.accept().await else {
                continue;
            };
            let registry = registry.clone();
            tokio::spawn(newstyle::list::handle_connection(stream, registry));
        }
    });

    Ok(())
}

/// Binds the HTTP status server. Returns once bound; `axum::serve` itself
/// runs forever in a background task.
pub async fn spawn_status(state: &AppState, port: u16) -> std::io::Result<()> {
    let status_state = status::StatusState {
        registry: state.registry.clone(),
    };
    let app = status::router()
        .with_state(status_state)
        .layer(tower_http::trace::TraceLayer::new_for_http());
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(?err, "status server exited");
        }
    });
    Ok(())
}
