use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_postgres::Statement;
use tracing::trace;

use crate::error::OrmError;

/// Bounded LRU of prepared statements keyed by SQL text.
///
/// Uses a generation counter: a hit restamps the entry, eviction scans for the
/// smallest stamp. Prepared statements belong to the connection that prepared
/// them, so one cache serves one connection.
#[derive(Debug)]
pub(super) struct StatementCache<V = Statement> {
    inner: Mutex<Entries<V>>,
}

#[derive(Debug)]
struct Entries<V> {
    capacity: usize,
    generation: u64,
    map: HashMap<String, (V, u64)>,
}

impl<V: Clone> StatementCache<V> {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Entries {
                capacity,
                generation: 0,
                map: HashMap::with_capacity(capacity.min(1024)),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn is_enabled(&self) -> bool {
        self.lock().capacity > 0
    }

    pub(super) fn get(&self, sql: &str) -> Option<V> {
        let mut entries = self.lock();
        let stamp = entries.next_stamp();
        let entry = entries.map.get_mut(sql)?;
        entry.1 = stamp;
        Some(entry.0.clone())
    }

    /// Store `value` unless another task cached `sql` first; returns the cached value.
    pub(super) fn insert(&self, sql: String, value: V) -> V {
        let mut entries = self.lock();
        if entries.capacity == 0 {
            return value;
        }
        let stamp = entries.next_stamp();
        if let Some(existing) = entries.map.get_mut(&sql) {
            existing.1 = stamp;
            return existing.0.clone();
        }
        entries.map.insert(sql, (value.clone(), stamp));
        entries.evict();
        value
    }

    pub(super) fn remove(&self, sql: &str) -> Option<V> {
        self.lock().map.remove(sql).map(|(value, _)| value)
    }

    pub(super) fn len(&self) -> usize {
        self.lock().map.len()
    }
}

impl<V> Entries<V> {
    fn next_stamp(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn evict(&mut self) {
        while self.map.len() > self.capacity {
            let oldest = self
                .map
                .iter()
                .min_by_key(|(_, (_, stamp))| *stamp)
                .map(|(sql, _)| sql.clone());
            match oldest {
                Some(sql) => {
                    self.map.remove(&sql);
                    trace!(target: "chainorm.pg", sql = %sql, "evicted cached statement");
                }
                None => break,
            }
        }
    }
}

/// Failures after which a cached statement should be dropped and re-prepared.
pub(super) fn is_stale_statement(err: &OrmError) -> bool {
    let OrmError::Query(e) = err else {
        return false;
    };
    let Some(db_err) = e.as_db_error() else {
        return false;
    };

    match db_err.code().code() {
        // feature_not_supported: "cached plan must not change result type"
        "0A000" => db_err
            .message()
            .to_ascii_lowercase()
            .contains("cached plan must not change result type"),
        // invalid_sql_statement_name
        "26000" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let cache = StatementCache::<u32>::new(2);
        cache.insert("a".into(), 1);
        cache.insert("b".into(), 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("c".into(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn first_insert_wins() {
        let cache = StatementCache::<u32>::new(4);
        assert_eq!(cache.insert("a".into(), 1), 1);
        assert_eq!(cache.insert("a".into(), 2), 1);
        assert_eq!(cache.remove("a"), Some(1));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = StatementCache::<u32>::new(0);
        assert!(!cache.is_enabled());
        assert_eq!(cache.insert("a".into(), 1), 1);
        assert_eq!(cache.get("a"), None);
    }
}
