use rand::seq::IteratorRandom;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("server pool empty")]
    PoolEmpty,
}

/// A discovered peer, as pushed down `GetDfsServers`'s server-stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfsServerInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
}

/// Picks a discovered `DfsServer` uniformly at random. This is the
/// client-side counterpart to `GetDfsServers`: once a client has the current
/// peer set, it load-balances over it without going back to the registry.
pub struct RandomPeerSelector {
    servers: RwLock<HashMap<String, DfsServerInfo>>,
}

impl RandomPeerSelector {
    pub fn new() -> Self {
        Self { servers: RwLock::new(HashMap::new()) }
    }

    pub fn add_server(&self, server: DfsServerInfo) {
        self.servers.write().unwrap().insert(server.id.clone(), server);
    }

    pub fn remove_server(&self, id: &str) {
        self.servers.write().unwrap().remove(id);
    }

    pub fn get_perfect_server(&self) -> Result<DfsServerInfo, SelectorError> {
        let servers = self.servers.read().unwrap();
        servers.values().choose(&mut rand::thread_rng()).cloned().ok_or(SelectorError::PoolEmpty)
    }
}

impl Default for RandomPeerSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_errors() {
        let selector = RandomPeerSelector::new();
        assert_eq!(selector.get_perfect_server(), Err(SelectorError::PoolEmpty));
    }

    #[test]
    fn picks_one_of_the_registered_servers() {
        let selector = RandomPeerSelector::new();
        selector.add_server(DfsServerInfo { id: "a".into(), host: "10.0.0.1".into(), port: 9000 });
        selector.add_server(DfsServerInfo { id: "b".into(), host: "10.0.0.2".into(), port: 9000 });

        for _ in 0..20 {
            let picked = selector.get_perfect_server().unwrap();
            assert!(picked.id == "a" || picked.id == "b");
        }
    }

    #[test]
    fn re_adding_a_server_updates_it_in_place() {
        let selector = RandomPeerSelector::new();
        selector.add_server(DfsServerInfo { id: "a".into(), host: "10.0.0.1".into(), port: 9000 });
        selector.add_server(DfsServerInfo { id: "a".into(), host: "10.0.0.9".into(), port: 9001 });
        assert_eq!(selector.get_perfect_server().unwrap().host, "10.0.0.9");
    }

    #[test]
    fn removed_server_is_no_longer_picked() {
        let selector = RandomPeerSelector::new();
        selector.add_server(DfsServerInfo { id: "a".into(), host: "10.0.0.1".into(), port: 9000 });
        selector.remove_server("a");
        assert_eq!(selector.get_perfect_server(), Err(SelectorError::PoolEmpty));
    }
}
