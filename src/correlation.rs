//! Correlation table (C4): maps an outstanding request id to the [`Resolver`]
//! that will complete its [`Waiter`](crate::waiter::Waiter) when a reply
//! arrives.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use tokio::sync::Mutex;

use crate::error::DriverError;
use crate::waiter::{self, Resolver, Waiter};

/// Shared table of in-flight requests, keyed by `K` (a `RequestId`-shaped
/// type — `u64` for JSON-RPC/MCP, `i64` for DAP's `seq`).
#[derive(Clone)]
pub struct CorrelationTable<K> {
    inner: Arc<Mutex<HashMap<K, Resolver>>>,
}

impl<K> Default for CorrelationTable<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K> CorrelationTable<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new outstanding request and returns the waiter the caller
    /// should await.
    pub async fn insert(&self, key: K) -> Waiter {
        let (resolver, waiter) = waiter::pair();
        self.inner.lock().await.insert(key, resolver);
        waiter
    }

    /// Removes and returns the resolver for `key`, if one is outstanding.
    /// This is the only way a reply is delivered — at most once per key.
    pub async fn steal(&self, key: &K) -> Option<Resolver> {
        self.inner.lock().await.remove(key)
    }

    /// Drains every outstanding resolver, completing each with
    /// [`DriverError::TransportClosed`]. Called when the pump shuts down so
    /// no caller waits forever on a dead transport.
    pub async fn drain_closed(&self) {
        let mut guard = self.inner.lock().await;
        for (_, resolver) in guard.drain() {
            resolver.resolve(Err(DriverError::TransportClosed));
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_steal_resolves() {
        let table: CorrelationTable<u64> = CorrelationTable::new();
        let waiter = table.insert(1).await;
        let resolver = table.steal(&1).await.expect("present");
        resolver.resolve(Ok(serde_json::json!(42)));
        assert_eq!(waiter.await_raw().await.unwrap(), serde_json::json!(42));
    }

    #[tokio::test]
    async fn steal_missing_key_is_none() {
        let table: CorrelationTable<u64> = CorrelationTable::new();
        assert!(table.steal(&99).await.is_none());
    }

    #[tokio::test]
    async fn drain_closed_completes_all_outstanding() {
        let table: CorrelationTable<u64> = CorrelationTable::new();
        let w1 = table.insert(1).await;
        let w2 = table.insert(2).await;
        table.drain_closed().await;
        assert!(matches!(
            w1.await_raw().await.unwrap_err(),
            DriverError::TransportClosed
        ));
        assert!(matches!(
            w2.await_raw().await.unwrap_err(),
            DriverError::TransportClosed
        ));
        assert!(table.is_empty().await);
    }
}
