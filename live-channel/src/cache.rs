use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Key of a cached query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// List of all entities of one kind, e.g. every `property`
    Collection(String),
    /// A single entity
    Entity { kind: String, id: String },
}

impl QueryKey {
    pub fn collection(kind: &str) -> Self {
        QueryKey::Collection(kind.to_string())
    }

    pub fn entity(kind: &str, id: &str) -> Self {
        QueryKey::Entity {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            QueryKey::Collection(kind) => kind,
            QueryKey::Entity { kind, .. } => kind,
        }
    }

    /// A collection key covers itself and every entity key of the same kind
    pub fn covers(&self, other: &QueryKey) -> bool {
        match self {
            QueryKey::Collection(kind) => other.kind() == kind,
            QueryKey::Entity { .. } => self == other,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stale: bool,
}

/// Query cache shared between views and the live channel.
///
/// Views `put` what they fetched and `subscribe` to invalidations; the live
/// channel calls `invalidate` so those views refetch.
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    invalidations: broadcast::Sender<QueryKey>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidations, _rx) = broadcast::channel(64);
        Self {
            entries: Mutex::new(HashMap::new()),
            invalidations,
        }
    }

    /// Stores a freshly fetched value
    pub fn put(&self, key: QueryKey, value: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, CacheEntry { value, stale: false });
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        let entries = self.entries.lock().ok()?;
        entries.get(key).map(|e| e.value.clone())
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).map(|e| e.stale))
            .unwrap_or(false)
    }

    /// Marks every entry covered by `key` stale and notifies subscribers.
    /// Returns how many cached entries were affected.
    pub fn invalidate(&self, key: &QueryKey) -> usize {
        let mut affected = 0;
        if let Ok(mut entries) = self.entries.lock() {
            for (cached_key, entry) in entries.iter_mut() {
                if key.covers(cached_key) {
                    entry.stale = true;
                    affected += 1;
                }
            }
        }

        log::debug!("Invalidated {:?} ({} cached entries)", key, affected);
        // No subscribers is fine: nothing is rendered that depends on the key
        let _ = self.invalidations.send(key.clone());
        affected
    }

    /// Subscribe to invalidation signals
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidations.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_invalidation_covers_entities() {
        let cache = QueryCache::new();
        cache.put(QueryKey::collection("property"), json!([]));
        cache.put(QueryKey::entity("property", "1"), json!({"id": "1"}));
        cache.put(QueryKey::entity("valuation", "1"), json!({"id": "1"}));

        let affected = cache.invalidate(&QueryKey::collection("property"));

        assert_eq!(affected, 2);
        assert!(cache.is_stale(&QueryKey::entity("property", "1")));
        assert!(!cache.is_stale(&QueryKey::entity("valuation", "1")));
    }

    #[test]
    fn test_put_refreshes_stale_entry() {
        let cache = QueryCache::new();
        let key = QueryKey::entity("property", "7");
        cache.put(key.clone(), json!({"status": "DRAFT"}));
        cache.invalidate(&key);
        assert!(cache.is_stale(&key));

        cache.put(key.clone(), json!({"status": "SUBMITTED"}));
        assert!(!cache.is_stale(&key));
        assert_eq!(cache.get(&key), Some(json!({"status": "SUBMITTED"})));
    }

    #[test]
    fn test_subscribers_receive_invalidated_key() {
        let cache = QueryCache::new();
        let mut rx = cache.subscribe();

        cache.invalidate(&QueryKey::collection("valuation"));

        assert_eq!(rx.try_recv().unwrap(), QueryKey::collection("valuation"));
    }
}
