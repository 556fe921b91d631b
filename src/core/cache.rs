//! Time-windowed cache abstraction shared by the scan pipeline.
//!
//! A cache maps a query key to the value fetched for it, the time it was
//! fetched and the end of its validity window. Backends live in
//! [`crate::store`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry fetched now. `None` ttl never expires.
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        let fetched_at = Utc::now();
        let expires_at = ttl
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| fetched_at + d);
        Self {
            value,
            fetched_at,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    /// Returns the live entry for `key`. Expired entries are evicted and
    /// reported as a miss.
    async fn get_entry(&self, key: &K) -> Option<CacheEntry<V>>;

    async fn get(&self, key: &K) -> Option<V>;

    async fn put(&self, key: K, value: V, ttl: Option<Duration>);

    async fn remove(&self, key: &K);

    async fn clear(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = CacheEntry::new(1.27, None);
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired_at(Utc::now() + chrono::Duration::days(365)));
    }

    #[test]
    fn test_entry_expires_after_window() {
        let entry = CacheEntry::new("AAPL".to_string(), Some(Duration::from_secs(3600)));
        let expiry = entry.expires_at.unwrap();
        assert_eq!(expiry - entry.fetched_at, chrono::Duration::hours(1));

        assert!(!entry.is_expired_at(entry.fetched_at + chrono::Duration::minutes(59)));
        assert!(entry.is_expired_at(entry.fetched_at + chrono::Duration::minutes(61)));
    }
}
