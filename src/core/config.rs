use crate::core::metrics::Metric;
use crate::core::screen::{Predicate, ScreenCriteria, SortSpec};
use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_YAHOO_COOKIE_URL: &str = "https://fc.yahoo.com";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    /// Page that hands out the session cookie used to obtain a crumb.
    pub cookie_url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
                cookie_url: None,
            }),
        }
    }
}

impl ProvidersConfig {
    pub fn yahoo_base_url(&self) -> &str {
        self.yahoo
            .as_ref()
            .map_or(DEFAULT_YAHOO_BASE_URL, |p| &p.base_url)
    }

    pub fn yahoo_cookie_url(&self) -> &str {
        self.yahoo
            .as_ref()
            .and_then(|p| p.cookie_url.as_deref())
            .unwrap_or(DEFAULT_YAHOO_COOKIE_URL)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_true")]
    pub persist: bool,
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            persist: true,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Constituents of one market index.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IndexConfig {
    pub name: String,
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UniverseConfig {
    #[serde(default)]
    pub indices: Vec<IndexConfig>,
    /// Symbols scanned in addition to the index members.
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// How many instruments of the universe a scan processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDepth {
    Limit(usize),
    All,
}

impl ScanDepth {
    pub fn take<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        match self {
            ScanDepth::Limit(n) => &items[..(*n).min(items.len())],
            ScanDepth::All => items,
        }
    }
}

impl Default for ScanDepth {
    fn default() -> Self {
        ScanDepth::Limit(50)
    }
}

impl Display for ScanDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanDepth::Limit(n) => write!(f, "{n}"),
            ScanDepth::All => write!(f, "all"),
        }
    }
}

impl FromStr for ScanDepth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") || s.eq_ignore_ascii_case("full") {
            return Ok(ScanDepth::All);
        }
        match s.parse::<usize>() {
            Ok(n) if n > 0 => Ok(ScanDepth::Limit(n)),
            _ => Err(anyhow!("Invalid scan depth (expected a positive number or 'all'): {}", s)),
        }
    }
}

impl Serialize for ScanDepth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScanDepth::Limit(n) => serializer.serialize_u64(*n as u64),
            ScanDepth::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for ScanDepth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(u64),
            Text(String),
        }
        let text = match Raw::deserialize(deserializer)? {
            Raw::Count(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// User-adjustable screening thresholds. Unset thresholds are not applied.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScreenConfig {
    #[serde(default = "default_min_yield")]
    pub min_yield: f64,
    pub min_roic: Option<f64>,
    pub min_margin: Option<f64>,
    pub max_debt_ebitda: Option<f64>,
    pub min_insider: Option<f64>,
    pub max_pe: Option<f64>,
    #[serde(default = "default_min_score")]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub depth: ScanDepth,
    #[serde(default = "default_sort")]
    pub sort: Vec<String>,
}

fn default_min_yield() -> f64 {
    3.0
}

fn default_min_score() -> Option<f64> {
    Some(40.0)
}

fn default_sort() -> Vec<String> {
    vec!["score".to_string(), "yield".to_string()]
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            min_yield: default_min_yield(),
            min_roic: None,
            min_margin: None,
            max_debt_ebitda: None,
            min_insider: None,
            max_pe: None,
            min_score: default_min_score(),
            depth: ScanDepth::default(),
            sort: default_sort(),
        }
    }
}

impl ScreenConfig {
    /// Predicates for every configured threshold. The minimum yield is always
    /// active since it also drives scoring.
    pub fn predicates(&self) -> Vec<Predicate> {
        let minimums = [
            (Metric::Roic, self.min_roic),
            (Metric::Margin, self.min_margin),
            (Metric::Insider, self.min_insider),
            (Metric::Score, self.min_score),
        ];
        let maximums = [
            (Metric::DebtEbitda, self.max_debt_ebitda),
            (Metric::Pe, self.max_pe),
        ];

        let mut predicates = vec![Predicate::at_least(Metric::Yield, self.min_yield)];
        predicates.extend(
            minimums
                .into_iter()
                .filter_map(|(metric, v)| v.map(|v| Predicate::at_least(metric, v))),
        );
        predicates.extend(
            maximums
                .into_iter()
                .filter_map(|(metric, v)| v.map(|v| Predicate::at_most(metric, v))),
        );
        predicates
    }

    pub fn criteria(&self, extra: &[Predicate]) -> Result<ScreenCriteria> {
        let mut predicates = self.predicates();
        predicates.extend_from_slice(extra);
        let sort = SortSpec::parse(&self.sort).context("Invalid sort configuration")?;
        Ok(ScreenCriteria { predicates, sort })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_foreign_currency")]
    pub foreign_currency: String,
    pub data_path: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_foreign_currency() -> String {
    "GBP".to_string()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fatpitch", "fatpitch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "fatpitch", "fatpitch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
