use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use lobby_common::{GameServer, ServerRegistry};
use parking_lot::Mutex;

use crate::constants::known_lobby_name;

#[derive(Clone)]
pub struct StatusState {
    pub registry: Arc<Mutex<ServerRegistry>>,
}

pub fn router() -> Router<StatusState> {
    Router::new().route("/status", get(status_handler))
}

async fn status_handler(State(state): State<StatusState>) -> Html<String> {
    Html(render_page(&state.registry))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn display_bytes(bytes: &[u8]) -> String {
    escape_html(&String::from_utf8_lossy(bytes))
}

fn format_players(server: &GameServer) -> String {
    if server.bots == 0 {
        format!("{}/{}", server.players, server.slots)
    } else {
        format!("{}+{}/{}", server.players, server.bots, server.slots)
    }
}

fn format_game(server: &GameServer) -> String {
    let Some(game) = server.infos.get(b"game".as_slice()) else {
        return String::new();
    };
    let mut label = display_bytes(game);
    if let Some(ver) = server.infos.get(b"game_ver".as_slice()) {
        label.push(' ');
        label.push_str(&display_bytes(ver));
    }
    if let Some(url) = server.infos.get(b"game_url".as_slice()) {
        let href = display_bytes(url);
        label = format!("<a href=\"{href}\">{label}</a>");
    }
    label
}

fn format_address(server: &GameServer) -> String {
    match server.ipv4_endpoint {
        Some((ip, port)) => format!("{ip}:{port}"),
        None => String::new(),
    }
}

fn render_row(server: &GameServer) -> String {
    let passworded = if server.passworded { "X" } else { "" };
    let name = display_bytes(&server.name);
    let map = server
        .infos
        .get(b"map".as_slice())
        .map(|m| display_bytes(m))
        .unwrap_or_default();
    format!(
        "<tr><td>{passworded}</td><td>{name}</td><td>{map}</td><td>{players}</td><td>{game}</td><td>{address}</td></tr>",
        players = format_players(server),
        game = format_game(server),
        address = format_address(server),
    )
}

fn render_table(registry: &Mutex<ServerRegistry>, lobby_id: uuid::Uuid) -> String {
    let label = known_lobby_name(lobby_id)
        .map(str::to_string)
        .unwrap_or_else(|| format!("unknown lobby \"{}\"", lobby_id.simple()));
    let servers = registry.lock().servers_in_lobby(lobby_id);
    let rows: String = servers.iter().map(render_row).collect();
    format!(
        "<h2>Active servers in the {}</h2>\
         <table class=\"serverlist\"><thead><tr>\
         <th>PW</th><th>Name</th><th>Map</th><th>Players</th><th>Game</th><th>Address</th>\
         </tr></thead><tbody>{rows}</tbody></table>",
        escape_html(&label),
    )
}

fn render_page(registry: &Mutex<ServerRegistry>) -> String {
    let lobbies = registry.lock().lobbies();
    let tables: String = lobbies
        .into_iter()
        .map(|lobby| render_table(registry, lobby))
        .collect();
    format!(
        "<!doctype html><html><head><title>Lobby status page</title>\
         <meta charset=\"utf-8\"></head><body>{tables}</body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_common::Transport;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn unknown_lobby_gets_a_fallback_label() {
        let registry = Mutex::new(ServerRegistry::new(Duration::from_secs(70)));
        let lobby = Uuid::new_v4();
        let mut server = GameServer::new(Uuid::new_v4(), lobby, Transport::Udp);
        server.ipv4_endpoint = Some((Ipv4Addr::new(1, 2, 3, 4), 9000));
        registry.lock().put(server);
        let table = render_table(&registry, lobby);
        assert!(table.contains("unknown lobby"));
    }

    #[test]
    fn row_escapes_html_in_name() {
        let mut server = GameServer::new(Uuid::new_v4(), Uuid::new_v4(), Transport::Udp);
        server.name = b"<script>".to_vec();
        let row = render_row(&server);
        assert!(!row.contains("<script>"));
        assert!(row.contains("&lt;script&gt;"));
    }

    #[test]
    fn players_with_bots_shows_plus_notation() {
        let mut server = GameServer::new(Uuid::new_v4(), Uuid::new_v4(), Transport::Udp);
        server.players = 3;
        server.bots = 2;
        server.slots = 10;
        assert_eq!(format_players(&server), "3+2/10");
    }
}
