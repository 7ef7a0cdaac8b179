//! Location and keyword classification.
//!
//! Pure functions over a record's current field values: no I/O, no state,
//! same answer every time for the same record.
//!
//! The region heuristics are deliberately loose (a bare "dc" anywhere in the
//! text counts as a region name, for instance). They trade precision for
//! recall and are kept as-is.

use leadscout_common::{ClassifierConfig, Record};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Why a location was accepted or rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationVerdict {
    /// Contains an excluded-region token. Always wins.
    Excluded(String),
    /// Mentions the country outright.
    CountryMarker(String),
    /// Contains an allow-listed region name.
    RegionName(String),
    /// Ends in an allow-listed region code after the last comma.
    RegionCode(String),
    /// Empty, unknown, or no rule matched.
    Rejected,
}

impl LocationVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            LocationVerdict::CountryMarker(_)
                | LocationVerdict::RegionName(_)
                | LocationVerdict::RegionCode(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    keywords: Vec<String>,
    country_markers: Vec<String>,
    region_names: Vec<String>,
    region_codes: Vec<String>,
    exclusion_tokens: Vec<String>,
    excluded_names: Vec<String>,
    excluded_codes: Vec<String>,
    require_open_to_work: bool,
}

impl Classifier {
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let mut exclusion_tokens = Vec::new();
        let mut excluded_names = Vec::new();
        let mut excluded_codes = Vec::new();
        for region in &config.excluded_regions {
            let name = region.name.trim().to_lowercase();
            if !name.is_empty() {
                exclusion_tokens.push(name.clone());
                excluded_names.push(name);
            }
            if let Some(code) = region.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                let lc = code.to_lowercase();
                exclusion_tokens.push(format!(", {lc}"));
                exclusion_tokens.push(format!(" {lc},"));
                exclusion_tokens.push(format!(" {lc} "));
                excluded_codes.push(code.to_uppercase());
            }
        }

        Self {
            keywords: lower(&config.keywords),
            country_markers: lower(&config.country_markers),
            region_names: lower(&config.region_names),
            region_codes: config
                .region_codes
                .iter()
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
            exclusion_tokens,
            excluded_names,
            excluded_codes,
            require_open_to_work: config.require_open_to_work,
        }
    }

    // -----------------------------------------------------------------------
    // Pure decision functions
    // -----------------------------------------------------------------------

    /// Location rules, in priority order:
    ///
    /// 1. Contains an excluded-region token → Excluded
    /// 2. Contains a country marker → accept
    /// 3. Contains an allow-listed region name → accept, unless that name is excluded
    /// 4. Trailing token after the last comma is an allow-listed code, not excluded → accept
    /// 5. Otherwise → Rejected
    pub fn location_verdict(&self, location: &str) -> LocationVerdict {
        let loc = location.trim().to_lowercase();
        if loc.is_empty() || loc == "unknown" {
            return LocationVerdict::Rejected;
        }

        if let Some(token) = self.exclusion_tokens.iter().find(|t| loc.contains(t.as_str())) {
            return LocationVerdict::Excluded(token.clone());
        }

        if let Some(marker) = self.country_markers.iter().find(|m| loc.contains(m.as_str())) {
            return LocationVerdict::CountryMarker(marker.clone());
        }

        if let Some(name) = self.region_names.iter().find(|n| loc.contains(n.as_str())) {
            if self.excluded_names.contains(name) {
                return LocationVerdict::Excluded(name.clone());
            }
            return LocationVerdict::RegionName(name.clone());
        }

        if let Some((_, tail)) = location.rsplit_once(',') {
            let code = tail.trim().to_uppercase();
            if self.region_codes.contains(&code) && !self.excluded_codes.contains(&code) {
                return LocationVerdict::RegionCode(code);
            }
        }

        LocationVerdict::Rejected
    }

    pub fn is_qualifying_location(&self, location: &str) -> bool {
        self.location_verdict(location).is_accepted()
    }

    /// Any configured keyword appears in the headline or the name.
    pub fn has_qualifying_keyword(&self, headline: &str, name: &str) -> bool {
        let headline = headline.to_lowercase();
        let name = name.to_lowercase();
        self.keywords
            .iter()
            .any(|kw| headline.contains(kw.as_str()) || name.contains(kw.as_str()))
    }

    /// Location and keyword checks, before any activity gate.
    pub fn passes_filters(&self, record: &Record) -> bool {
        self.is_qualifying_location(&record.location)
            && self.has_qualifying_keyword(&record.headline, &record.name)
            && (!self.require_open_to_work || record.open_to_work)
    }

    /// Full qualification verdict for a record.
    pub fn qualifies(&self, record: &Record) -> bool {
        self.passes_filters(record) && record.recently_active != Some(false)
    }
}

// ===========================================================================
// Unit tests
// ===========================================================================
