use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Where a field's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Card,
    Enriched,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Card => write!(f, "card"),
            Provenance::Enriched => write!(f, "enriched"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldSources {
    pub name: Provenance,
    pub headline: Provenance,
    pub location: Provenance,
}

/// One candidate profile observed on a listing page. `url` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub url: String,
    pub name: String,
    pub headline: String,
    pub location: String,
    pub open_to_work: bool,
    /// Outcome of the optional recent-activity probe. `None` means not probed.
    pub recently_active: Option<bool>,
    pub sources: FieldSources,
    qualified: Option<bool>,
}

impl Record {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: String::new(),
            headline: String::new(),
            location: String::new(),
            open_to_work: false,
            recently_active: None,
            sources: FieldSources::default(),
            qualified: None,
        }
    }

    /// Card extraction left headline or location empty.
    pub fn needs_enrichment(&self) -> bool {
        self.headline.is_empty() || self.location.is_empty()
    }

    /// Backfill fields from a detail fetch. Empty values never overwrite.
    pub fn apply_enrichment(&mut self, name: &str, headline: &str, location: &str) {
        if !name.is_empty() {
            self.name = name.to_string();
            self.sources.name = Provenance::Enriched;
        }
        if !headline.is_empty() {
            self.headline = headline.to_string();
            self.sources.headline = Provenance::Enriched;
        }
        if !location.is_empty() {
            self.location = location.to_string();
            self.sources.location = Provenance::Enriched;
        }
    }

    /// The `Company/Title` column carries the headline.
    pub fn company_or_title(&self) -> &str {
        &self.headline
    }

    /// Record the classifier verdict. The first verdict sticks.
    pub fn set_verdict(&mut self, qualified: bool) -> bool {
        *self.qualified.get_or_insert(qualified)
    }

    pub fn verdict(&self) -> Option<bool> {
        self.qualified
    }

    pub fn is_qualified(&self) -> bool {
        self.qualified.unwrap_or(false)
    }
}

/// Canonical profile identifier: resolved against `base`, query and fragment stripped.
pub fn normalize_profile_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let mut parsed = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    parsed.set_query(None);
    parsed.set_fragment(None);
    Some(parsed.to_string())
}

// ---------------------------------------------------------------------------
// Session cookies
// ---------------------------------------------------------------------------

/// Browser cookie in the shape puppeteer reports and accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }
}
