use crate::core::config::IndexConfig;
use crate::core::universe::IndexMembershipProvider;
use anyhow::{Result, anyhow};
use async_trait::async_trait;

/// Index membership read from the configuration file.
pub struct ConfigIndexProvider {
    indices: Vec<IndexConfig>,
}

impl ConfigIndexProvider {
    pub fn new(indices: Vec<IndexConfig>) -> Self {
        Self { indices }
    }
}

#[async_trait]
impl IndexMembershipProvider for ConfigIndexProvider {
    async fn constituents(&self, index: &str) -> Result<Vec<String>> {
        self.indices
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(index))
            .map(|i| i.symbols.clone())
            .ok_or_else(|| anyhow!("Unknown index: {}", index))
    }

    fn indices(&self) -> Vec<String> {
        self.indices.iter().map(|i| i.name.clone()).collect()
    }

    fn cache_lists(&self) -> bool {
        false
    }
}
