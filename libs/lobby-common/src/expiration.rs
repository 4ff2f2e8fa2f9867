use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Ordered set of keys with a fixed time-to-live, swept lazily on access.
///
/// There is no background timer: every public method sweeps stale entries
/// before doing its own work, so a set that's never touched again simply
/// never pays for cleanup. `add` moves an existing key to the back (renewing
/// its TTL) and leaves its old queue slot behind — `sweep` recognizes and
/// silently discards those stale slots rather than reporting them as
/// evictions.
pub struct ExpirationSet<K> {
    retention: Duration,
    order: VecDeque<(K, Instant)>,
    current: HashMap<K, Instant>,
}

impl<K: Eq + Hash + Clone> ExpirationSet<K> {
    pub fn new(retention: Duration) -> Self {
        Self {
            retention,
            order: VecDeque::new(),
            current: HashMap::new(),
        }
    }

    /// Sweeps, then inserts (or renews) `key`.
    pub fn add(&mut self, key: K) {
        self.sweep();
        let now = Instant::now();
        self.current.insert(key.clone(), now);
        self.order.push_back((key, now));
    }

    /// Removes `key` if present. Returns whether anything was removed.
    /// Does not sweep other entries.
    pub fn discard(&mut self, key: &K) -> bool {
        self.current.remove(key).is_some()
    }

    /// Sweeps, then reports whether `key` is still live.
    pub fn contains(&mut self, key: &K) -> bool {
        self.sweep();
        self.current.contains_key(key)
    }

    /// Evicts every entry older than the retention window, in age order,
    /// and returns the evicted keys. Stale queue slots left behind by a
    /// renewed `add` or an explicit `discard` are dropped silently and do
    /// not appear in the returned list.
    pub fn sweep(&mut self) -> Vec<K> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        loop {
            let Some((key, inserted_at)) = self.order.front() else {
                break;
            };
            let is_current = self.current.get(key) == Some(inserted_at);
            if !is_current {
                self.order.pop_front();
                continue;
            }
            if now.duration_since(*inserted_at) < self.retention {
                break;
            }
            let (key, _) = self.order.pop_front().expect("front just checked Some");
            self.current.remove(&key);
            evicted.push(key);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_key_is_contained() {
        let mut set = ExpirationSet::new(Duration::from_secs(60));
        set.add("a");
        assert!(set.contains(&"a"));
        assert!(!set.contains(&"b"));
    }

    #[test]
    fn sweep_evicts_only_past_retention() {
        let mut set: ExpirationSet<&str> = ExpirationSet::new(Duration::from_millis(20));
        set.add("a");
        std::thread::sleep(Duration::from_millis(40));
        set.add("b");
        let evicted = set.sweep();
        assert_eq!(evicted, vec!["a"]);
        assert!(!set.contains(&"a"));
        assert!(set.contains(&"b"));
    }

    #[test]
    fn renewing_a_key_moves_it_to_the_back() {
        let mut set: ExpirationSet<&str> = ExpirationSet::new(Duration::from_millis(30));
        set.add("a");
        std::thread::sleep(Duration::from_millis(15));
        set.add("b");
        std::thread::sleep(Duration::from_millis(15));
        // renew "a" — it should survive past the point where it would
        // otherwise have expired, and its stale queue slot must not be
        // double-reported on the next sweep.
        set.add("a");
        std::thread::sleep(Duration::from_millis(20));
        let evicted = set.sweep();
        assert_eq!(evicted, vec!["b"]);
        assert!(set.contains(&"a"));
    }

    #[test]
    fn discard_removes_without_reporting_eviction() {
        let mut set: ExpirationSet<&str> = ExpirationSet::new(Duration::from_secs(60));
        set.add("a");
        assert!(set.discard(&"a"));
        assert!(!set.discard(&"a"));
        assert!(!set.contains(&"a"));
    }

    #[test]
    fn is_empty_tracks_len() {
        let mut set: ExpirationSet<&str> = ExpirationSet::new(Duration::from_secs(60));
        assert!(set.is_empty());
        set.add("a");
        assert_eq!(set.len(), 1);
    }
}
