use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lobby_server::config::Config;
use lobby_server::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally).
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let state = AppState::new(&config);

    tracing::info!(
        legacy_port = config.legacy_port,
        newstyle_port = config.newstyle_port,
        web_port = config.web_port,
        banned_ips = config.banned_ips.len(),
        "lobby-server configured"
    );

    lobby_server::spawn_legacy(&state, config.legacy_port)
        .await
        .expect("failed to bind legacy listeners");
    lobby_server::spawn_newstyle(&state, config.newstyle_port)
        .await
        .expect("failed to bind newstyle listeners");
    lobby_server::spawn_status(&state, config.web_port)
        .await
        .expect("failed to bind status listener");

    tracing::info!("lobby-server listening");

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    tracing::info!("shutting down");
}
