use url::Url;

use leadscout_common::{LeadScoutError, SearchConfig};

/// Containers that signal the result list has rendered, in preference order.
pub const RESULT_SELECTORS: &[&str] = &[
    "ul.reusable-search__entity-result-list",
    "li.reusable-search__result-container",
    "[class*='search-results-container']",
];

/// Builds the listing URL for a given page number.
#[derive(Debug, Clone)]
pub struct ListingQuery {
    base: Url,
    query: Option<String>,
    geo_urn: Option<String>,
}

impl ListingQuery {
    pub fn new(base: &str, query: Option<String>, geo_urn: Option<String>) -> Result<Self, LeadScoutError> {
        let base = Url::parse(base)
            .map_err(|e| LeadScoutError::Config(format!("invalid listing URL {base}: {e}")))?;
        Ok(Self {
            base,
            query: query.filter(|q| !q.trim().is_empty()),
            geo_urn: geo_urn.filter(|g| !g.trim().is_empty()),
        })
    }

    /// Query text defaults to the first keyword, quoted for exact matching.
    pub fn from_config(search: &SearchConfig, keywords: &[String]) -> Result<Self, LeadScoutError> {
        let query = search.query.clone().or_else(|| {
            keywords
                .iter()
                .find(|k| !k.trim().is_empty())
                .map(|k| format!("\"{}\"", k.trim()))
        });
        Self::new(&search.listing_url, query, search.geo_urn.clone())
    }

    pub fn page_url(&self, page: u32) -> String {
        let mut url = self.base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(ref query) = self.query {
                pairs.append_pair("keywords", query);
                pairs.append_pair("origin", "FACETED_SEARCH");
            }
            if let Some(ref geo) = self.geo_urn {
                pairs.append_pair("geoUrn", &format!("[\"{geo}\"]"));
            }
            pairs.append_pair("page", &page.to_string());
        }
        url.to_string()
    }
}

/// In-page script: scroll to the bottom up to `rounds` times, pausing between
/// rounds, stopping once the document height stops growing. Returns the final height.
pub fn lazy_load_script(rounds: u32, pause_ms: u64) -> String {
    format!(
        "(async (rounds, pauseMs) => {{ \
           let last = 0; \
           for (let i = 0; i < rounds; i++) {{ \
             window.scrollTo(0, document.body.scrollHeight); \
             await new Promise((r) => setTimeout(r, pauseMs)); \
             const height = document.body.scrollHeight; \
             if (height === last) break; \
             last = height; \
           }} \
           return last; \
         }})({rounds}, {pause_ms})"
    )
}
