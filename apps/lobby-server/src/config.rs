use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Lobby server configuration, loaded from environment variables.
///
/// Every setting has a sensible default matching the well-known deployment,
/// so nothing here panics on a missing variable — there's nothing this
/// daemon can't run without.
#[derive(Debug, Clone)]
pub struct Config {
    /// UDP + TCP port for the legacy (v1) protocol.
    pub legacy_port: u16,
    /// UDP + TCP port for the new-style protocol.
    pub newstyle_port: u16,
    /// TCP port for the HTTP status page.
    pub web_port: u16,
    /// Source IPv4 addresses whose registrations are always dropped.
    pub banned_ips: HashSet<Ipv4Addr>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            legacy_port: port_var("LOBBY_LEGACY_PORT", 29942),
            newstyle_port: port_var("LOBBY_NEWSTYLE_PORT", 29944),
            web_port: port_var("LOBBY_WEB_PORT", 29950),
            banned_ips: banned_ips_var("LOBBY_BANNED_IPS"),
        }
    }
}

fn port_var(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn banned_ips_var(name: &str) -> HashSet<Ipv4Addr> {
    std::env::var(name)
        .ok()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}
