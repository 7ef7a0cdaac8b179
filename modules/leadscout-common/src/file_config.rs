use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::LeadScoutError;

/// TOML-backed run configuration. Secrets stay in env vars ([`AppConfig`](crate::AppConfig)).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub search: SearchConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Listing endpoint; `page`, keyword and geo parameters are appended per page.
    pub listing_url: String,
    /// Free-text search query. Defaults to the first classifier keyword, quoted.
    #[serde(default)]
    pub query: Option<String>,
    /// Geographic facet identifier, sent as `geoUrn=["<urn>"]`.
    #[serde(default)]
    pub geo_urn: Option<String>,
    /// Path fragment that marks a hyperlink as a profile link.
    #[serde(default = "default_profile_marker")]
    pub profile_path_marker: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Page only reachable when logged in.
    pub auth_check_url: String,
    /// Page the operator should log in on.
    #[serde(default)]
    pub login_url: Option<String>,
    /// Substrings of the landed URL that mean "not authenticated".
    #[serde(default = "default_login_markers")]
    pub login_markers: Vec<String>,
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExcludedRegion {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_country_markers")]
    pub country_markers: Vec<String>,
    #[serde(default = "default_region_names")]
    pub region_names: Vec<String>,
    #[serde(default = "default_region_codes")]
    pub region_codes: Vec<String>,
    #[serde(default = "default_excluded_regions")]
    pub excluded_regions: Vec<ExcludedRegion>,
    #[serde(default)]
    pub require_open_to_work: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            country_markers: default_country_markers(),
            region_names: default_region_names(),
            region_codes: default_region_codes(),
            excluded_regions: default_excluded_regions(),
            require_open_to_work: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    pub start_page: u32,
    pub end_page: u32,
    /// Pages per render session.
    pub batch_size: u32,
    pub cooldown_min_secs: u64,
    pub cooldown_max_secs: u64,
    /// Run-wide ceiling on detail-page fetches.
    pub max_enrichments: u32,
    /// Must be nonzero; a zero navigation timeout would never expire.
    pub navigation_timeout_secs: u64,
    /// Zero skips selector waits and reads whatever the page rendered.
    pub element_wait_secs: u64,
    pub scroll_rounds: u32,
    pub scroll_pause_ms: u64,
    /// When set, qualifying records must show activity within this many days.
    pub recent_activity_days: Option<u32>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            end_page: 1,
            batch_size: 5,
            cooldown_min_secs: 20,
            cooldown_max_secs: 35,
            max_enrichments: 80,
            navigation_timeout_secs: 30,
            element_wait_secs: 20,
            scroll_rounds: 10,
            scroll_pause_ms: 1000,
            recent_activity_days: None,
        }
    }
}

impl CrawlConfig {
    pub fn cooldown_range(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.cooldown_min_secs),
            Duration::from_secs(self.cooldown_max_secs),
        )
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl FileConfig {
    pub fn validate(&self) -> Result<(), LeadScoutError> {
        let crawl = &self.crawl;
        if crawl.start_page == 0 {
            return Err(LeadScoutError::Config("crawl.start_page must be >= 1".into()));
        }
        if crawl.end_page < crawl.start_page {
            return Err(LeadScoutError::Config(format!(
                "crawl.end_page ({}) is before crawl.start_page ({})",
                crawl.end_page, crawl.start_page
            )));
        }
        if crawl.batch_size == 0 {
            return Err(LeadScoutError::Config("crawl.batch_size must be >= 1".into()));
        }
        if crawl.navigation_timeout_secs == 0 {
            return Err(LeadScoutError::Config(
                "crawl.navigation_timeout_secs must be >= 1".into(),
            ));
        }
        if crawl.cooldown_min_secs > crawl.cooldown_max_secs {
            return Err(LeadScoutError::Config(
                "crawl.cooldown_min_secs exceeds crawl.cooldown_max_secs".into(),
            ));
        }
        if url::Url::parse(&self.search.listing_url).is_err() {
            return Err(LeadScoutError::Config(format!(
                "search.listing_url is not a valid URL: {}",
                self.search.listing_url
            )));
        }
        if self.classifier.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(LeadScoutError::Config(
                "classifier.keywords must name at least one keyword".into(),
            ));
        }
        Ok(())
    }
}

/// Load, parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_profile_marker() -> String {
    "/in/".to_string()
}

fn default_login_markers() -> Vec<String> {
    vec!["login".to_string(), "checkpoint".to_string()]
}

fn default_session_file() -> PathBuf {
    PathBuf::from("session_cookies.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_country_markers() -> Vec<String> {
    ["united states", "u.s.", "usa"].iter().map(|s| s.to_string()).collect()
}

fn default_region_names() -> Vec<String> {
    [
        "alabama", "alaska", "arizona", "arkansas", "california", "colorado",
        "connecticut", "delaware", "florida", "georgia", "hawaii", "idaho",
        "illinois", "indiana", "iowa", "kansas", "kentucky", "louisiana", "maine",
        "maryland", "massachusetts", "michigan", "minnesota", "mississippi",
        "missouri", "montana", "nebraska", "nevada", "new hampshire", "new jersey",
        "new mexico", "new york", "north carolina", "north dakota", "ohio", "oklahoma",
        "oregon", "pennsylvania", "rhode island", "south carolina", "south dakota",
        "tennessee", "texas", "utah", "vermont", "virginia", "washington",
        "west virginia", "wisconsin", "wyoming", "district of columbia",
        "washington, d.c.", "washington dc", "d.c.", "dc",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_region_codes() -> Vec<String> {
    [
        "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "IA",
        "ID", "IL", "IN", "KS", "KY", "LA", "MA", "MD", "ME", "MI", "MN", "MO", "MS",
        "MT", "NC", "ND", "NE", "NH", "NJ", "NM", "NV", "NY", "OH", "OK", "OR", "PA",
        "RI", "SC", "SD", "TN", "TX", "UT", "VA", "VT", "WA", "WI", "WV", "WY", "PR",
        "GU", "VI",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_excluded_regions() -> Vec<ExcludedRegion> {
    vec![ExcludedRegion {
        name: "New York".to_string(),
        code: Some("NY".to_string()),
    }]
}
