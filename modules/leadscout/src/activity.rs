//! Recent-activity gate: does a profile show any post within the window?

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::enrichment::read_isolated;
use crate::extract::locator::element_text;
use crate::render::RenderEngine;

/// Elements carrying a post's relative age ("3d •", "2 weeks ago").
pub const ACTIVITY_MARKERS: &[&str] = &[
    "span.update-components-actor__sub-description",
    "span[class*='update-components-actor__sub-description']",
    "span[class*='feed-shared-actor__sub-description']",
];

const ACTIVITY_READY: &[&str] = &[
    "span[class*='update-components-actor__sub-description']",
    "main",
];

static RE_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+)\s*(years?|yrs?|yr|y|months?|mos?|weeks?|wks?|w|days?|d|hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)\b",
    )
    .expect("valid regex")
});

/// Parse a relative age into whole days. Sub-day ages are 0.
pub fn parse_age_days(text: &str) -> Option<u32> {
    let lower = text.to_lowercase();
    if lower.contains("just now") || lower.trim() == "now" {
        return Some(0);
    }
    let caps = RE_AGE.captures(&lower)?;
    let n: u32 = caps[1].parse().ok()?;
    let unit = &caps[2];
    let days = if unit.starts_with('y') {
        n.saturating_mul(365)
    } else if unit.starts_with("mo") {
        n.saturating_mul(30)
    } else if unit.starts_with('w') {
        n.saturating_mul(7)
    } else if unit.starts_with('d') {
        n
    } else {
        0
    };
    Some(days)
}

pub fn activity_url(profile_url: &str) -> String {
    format!("{}/recent-activity/", profile_url.trim_end_matches('/'))
}

/// Ages (in days) of every activity marker on the page, in document order.
pub fn activity_ages(html: &str) -> Vec<u32> {
    let document = Html::parse_document(html);
    let mut ages = Vec::new();
    for marker in ACTIVITY_MARKERS {
        let Ok(selector) = Selector::parse(marker) else {
            continue;
        };
        ages.extend(
            document
                .select(&selector)
                .filter_map(|el| parse_age_days(&element_text(el))),
        );
        if !ages.is_empty() {
            break;
        }
    }
    ages
}

pub fn is_recent(html: &str, window_days: u32) -> bool {
    activity_ages(html).into_iter().any(|age| age <= window_days)
}

/// Fetches `<profile>/recent-activity/` and checks post ages.
pub struct ActivityProbe {
    window_days: u32,
    element_wait: Duration,
}

impl ActivityProbe {
    pub fn new(window_days: u32, element_wait: Duration) -> Self {
        Self {
            window_days,
            element_wait,
        }
    }

    /// A failed probe counts as inactive.
    pub async fn probe(&self, engine: &mut dyn RenderEngine, profile_url: &str) -> bool {
        let url = activity_url(profile_url);
        match read_isolated(engine, &url, ACTIVITY_READY, self.element_wait).await {
            Ok(html) => {
                let recent = is_recent(&html, self.window_days);
                debug!(url = url.as_str(), recent, window_days = self.window_days, "Activity probed");
                recent
            }
            Err(e) => {
                warn!(url = url.as_str(), error = %e, "Activity probe failed, treating as inactive");
                false
            }
        }
    }
}
