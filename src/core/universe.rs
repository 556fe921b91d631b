//! Ticker universe assembly from index membership lists

use crate::core::cache::Cache;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait IndexMembershipProvider: Send + Sync {
    /// Constituent symbols of the named index.
    async fn constituents(&self, index: &str) -> Result<Vec<String>>;

    /// Names of the indices this provider knows.
    fn indices(&self) -> Vec<String>;

    /// Whether membership lists should go through the universe cache. Lists
    /// read from local configuration must reflect every edit immediately.
    fn cache_lists(&self) -> bool {
        true
    }
}

/// Union of all lists, sorted lexicographically with duplicates removed.
/// Blank symbols are ignored.
pub fn build_universe<S: AsRef<str>>(lists: &[Vec<S>]) -> Vec<String> {
    lists
        .iter()
        .flatten()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted union of every index's members and the extra symbols. Membership
/// lists are read through `cache` when the provider allows it. Indices whose
/// membership cannot be listed are left out.
pub async fn resolve_universe(
    index_provider: &dyn IndexMembershipProvider,
    extra: &[String],
    cache: &dyn Cache<String, Vec<String>>,
    ttl: Option<Duration>,
) -> Vec<String> {
    let use_cache = index_provider.cache_lists();
    let mut lists = Vec::new();
    for index in index_provider.indices() {
        if use_cache {
            if let Some(symbols) = cache.get(&index).await {
                lists.push(symbols);
                continue;
            }
        }
        match index_provider.constituents(&index).await {
            Ok(symbols) => {
                debug!(index = %index, count = symbols.len(), "Listed index members");
                if use_cache {
                    cache.put(index, symbols.clone(), ttl).await;
                }
                lists.push(symbols);
            }
            Err(e) => warn!(index = %index, error = %e, "Failed to list index members"),
        }
    }
    lists.push(extra.to_vec());
    build_universe(&lists)
}
