use std::collections::{HashMap, HashSet};
use std::time::Duration;

use uuid::Uuid;

use crate::expiration::ExpirationSet;
use crate::model::{Endpoint, GameServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Accepted,
    /// Rejected because another server already owns one of the requested
    /// endpoints, or because the record has no endpoint at all once
    /// inheritance has been applied.
    Rejected,
}

/// Indexed set of currently-live `GameServer` records.
///
/// Holds no lock of its own — a multi-threaded caller is expected to wrap
/// the whole registry in one coarse mutex, since `put` needs the
/// endpoint-theft check and the endpoint-inheritance step to be atomic with
/// respect to each other.
pub struct ServerRegistry {
    by_id: HashMap<Uuid, GameServer>,
    by_endpoint: HashMap<Endpoint, Uuid>,
    by_lobby: HashMap<Uuid, HashSet<Uuid>>,
    expirations: ExpirationSet<Uuid>,
}

impl ServerRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            by_id: HashMap::new(),
            by_endpoint: HashMap::new(),
            by_lobby: HashMap::new(),
            expirations: ExpirationSet::new(retention),
        }
    }

    /// Inserts or refreshes `new`. Endpoint theft is rejected before
    /// inheritance is applied, and a record with no endpoint after
    /// inheritance is rejected too.
    pub fn put(&mut self, mut new: GameServer) -> PutOutcome {
        self.purge_expired();

        for endpoint in new.endpoints() {
            if let Some(&owner) = self.by_endpoint.get(&endpoint) {
                if owner != new.server_id {
                    return PutOutcome::Rejected;
                }
            }
        }

        if let Some(old) = self.by_id.get(&new.server_id) {
            if new.ipv4_endpoint.is_none() {
                new.ipv4_endpoint = old.ipv4_endpoint;
            }
            if new.ipv6_endpoint.is_none() {
                new.ipv6_endpoint = old.ipv6_endpoint;
            }
        }

        if !new.has_endpoint() {
            return PutOutcome::Rejected;
        }

        self.purge_id(new.server_id);

        for endpoint in new.endpoints() {
            self.by_endpoint.insert(endpoint, new.server_id);
        }
        self.by_lobby
            .entry(new.lobby_id)
            .or_default()
            .insert(new.server_id);

        let server_id = new.server_id;
        self.by_id.insert(server_id, new);
        self.expirations.add(server_id);
        PutOutcome::Accepted
    }

    /// Removes a server immediately, independent of its expiration.
    pub fn remove(&mut self, server_id: Uuid) {
        self.expirations.discard(&server_id);
        self.purge_id(server_id);
    }

    /// Snapshot of every live server currently in `lobby_id`.
    pub fn servers_in_lobby(&mut self, lobby_id: Uuid) -> Vec<GameServer> {
        self.purge_expired();
        self.by_lobby
            .get(&lobby_id)
            .into_iter()
            .flatten()
            .filter_map(|sid| self.by_id.get(sid).cloned())
            .collect()
    }

    /// Snapshot of every lobby UUID that currently has at least one live
    /// server.
    pub fn lobbies(&mut self) -> Vec<Uuid> {
        self.purge_expired();
        self.by_lobby.keys().copied().collect()
    }

    fn purge_expired(&mut self) {
        for server_id in self.expirations.sweep() {
            self.purge_id(server_id);
        }
    }

    /// Removes `server_id` from `by_id`/`by_endpoint`/`by_lobby`, leaving
    /// `expirations` untouched — callers that already know the expiration
    /// entry is gone (a fresh expiry sweep, or an explicit `discard`) call
    /// this directly instead of going through `remove`.
    fn purge_id(&mut self, server_id: Uuid) {
        let Some(old) = self.by_id.remove(&server_id) else {
            return;
        };
        for endpoint in old.endpoints() {
            if self.by_endpoint.get(&endpoint) == Some(&server_id) {
                self.by_endpoint.remove(&endpoint);
            }
        }
        if let Some(bucket) = self.by_lobby.get_mut(&old.lobby_id) {
            bucket.remove(&server_id);
            if bucket.is_empty() {
                self.by_lobby.remove(&old.lobby_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transport;
    use std::net::Ipv4Addr;

    fn server_with_ipv4(server_id: Uuid, lobby_id: Uuid, ip: Ipv4Addr, port: u16) -> GameServer {
        let mut s = GameServer::new(server_id, lobby_id, Transport::Udp);
        s.ipv4_endpoint = Some((ip, port));
        s
    }

    #[test]
    fn put_then_query_round_trips() {
        let mut reg = ServerRegistry::new(Duration::from_secs(70));
        let lobby = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let server = server_with_ipv4(sid, lobby, Ipv4Addr::new(1, 2, 3, 4), 9000);
        assert_eq!(reg.put(server), PutOutcome::Accepted);
        let servers = reg.servers_in_lobby(lobby);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].server_id, sid);
        assert_eq!(reg.lobbies(), vec![lobby]);
    }

    #[test]
    fn endpoint_theft_is_rejected() {
        let mut reg = ServerRegistry::new(Duration::from_secs(70));
        let lobby = Uuid::new_v4();
        let ip = Ipv4Addr::new(1, 2, 3, 4);
        let a = server_with_ipv4(Uuid::new_v4(), lobby, ip, 9000);
        assert_eq!(reg.put(a), PutOutcome::Accepted);

        let b = server_with_ipv4(Uuid::new_v4(), lobby, ip, 9000);
        assert_eq!(reg.put(b), PutOutcome::Rejected);
        assert_eq!(reg.servers_in_lobby(lobby).len(), 1);
    }

    #[test]
    fn refreshing_the_same_server_id_replaces_it() {
        let mut reg = ServerRegistry::new(Duration::from_secs(70));
        let lobby = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let ip = Ipv4Addr::new(1, 2, 3, 4);
        let mut first = server_with_ipv4(sid, lobby, ip, 9000);
        first.players = 1;
        assert_eq!(reg.put(first), PutOutcome::Accepted);

        let mut second = server_with_ipv4(sid, lobby, ip, 9000);
        second.players = 5;
        assert_eq!(reg.put(second), PutOutcome::Accepted);

        let servers = reg.servers_in_lobby(lobby);
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].players, 5);
    }

    #[test]
    fn endpoint_inheritance_fills_missing_endpoint() {
        let mut reg = ServerRegistry::new(Duration::from_secs(70));
        let lobby = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let ip = Ipv4Addr::new(1, 2, 3, 4);
        let first = server_with_ipv4(sid, lobby, ip, 9000);
        assert_eq!(reg.put(first), PutOutcome::Accepted);

        // A follow-up commit with no ipv4 endpoint at all must inherit the
        // previous one rather than being rejected for having none.
        let second = GameServer::new(sid, lobby, Transport::Udp);
        assert_eq!(reg.put(second), PutOutcome::Accepted);
        let servers = reg.servers_in_lobby(lobby);
        assert_eq!(servers[0].ipv4_endpoint, Some((ip, 9000)));
    }

    #[test]
    fn no_endpoint_at_all_is_rejected() {
        let mut reg = ServerRegistry::new(Duration::from_secs(70));
        let server = GameServer::new(Uuid::new_v4(), Uuid::new_v4(), Transport::Udp);
        assert_eq!(reg.put(server), PutOutcome::Rejected);
    }

    #[test]
    fn remove_drops_the_server_and_empties_the_lobby_bucket() {
        let mut reg = ServerRegistry::new(Duration::from_secs(70));
        let lobby = Uuid::new_v4();
        let sid = Uuid::new_v4();
        let server = server_with_ipv4(sid, lobby, Ipv4Addr::new(1, 2, 3, 4), 9000);
        reg.put(server);
        reg.remove(sid);
        assert!(reg.servers_in_lobby(lobby).is_empty());
        assert!(reg.lobbies().is_empty());
    }

    #[test]
    fn expired_servers_stop_appearing_in_queries() {
        let mut reg = ServerRegistry::new(Duration::from_millis(20));
        let lobby = Uuid::new_v4();
        let server = server_with_ipv4(Uuid::new_v4(), lobby, Ipv4Addr::new(1, 2, 3, 4), 9000);
        reg.put(server);
        std::thread::sleep(Duration::from_millis(40));
        assert!(reg.servers_in_lobby(lobby).is_empty());
        assert!(reg.lobbies().is_empty());
    }

    #[test]
    fn two_servers_can_share_a_lobby() {
        let mut reg = ServerRegistry::new(Duration::from_secs(70));
        let lobby = Uuid::new_v4();
        reg.put(server_with_ipv4(
            Uuid::new_v4(),
            lobby,
            Ipv4Addr::new(1, 1, 1, 1),
            1,
        ));
        reg.put(server_with_ipv4(
            Uuid::new_v4(),
            lobby,
            Ipv4Addr::new(2, 2, 2, 2),
            2,
        ));
        assert_eq!(reg.servers_in_lobby(lobby).len(), 2);
    }
}
