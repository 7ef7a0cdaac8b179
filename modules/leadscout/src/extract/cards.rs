use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use leadscout_common::normalize_profile_url;

/// Structural marker for a result container, tried in priority order.
#[derive(Debug, Clone, Copy)]
pub struct ContainerMarker {
    pub tag: Option<&'static str>,
    pub class_contains: Option<&'static str>,
}

impl ContainerMarker {
    const fn new(tag: Option<&'static str>, class_contains: Option<&'static str>) -> Self {
        Self {
            tag,
            class_contains,
        }
    }

    fn matches(&self, element: &ElementRef<'_>) -> bool {
        let value = element.value();
        if let Some(tag) = self.tag {
            if value.name() != tag {
                return false;
            }
        }
        match self.class_contains {
            Some(fragment) => value
                .attr("class")
                .map(|class| class.contains(fragment))
                .unwrap_or(false),
            None => true,
        }
    }
}

pub const CARD_CONTAINERS: &[ContainerMarker] = &[
    ContainerMarker::new(Some("li"), Some("reusable-search__result-container")),
    ContainerMarker::new(Some("div"), Some("reusable-search__result-container")),
    ContainerMarker::new(Some("div"), Some("entity-result")),
    ContainerMarker::new(Some("li"), None),
    ContainerMarker::new(Some("div"), None),
];

/// One physical result card, detached from the document it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CardHandle {
    /// Canonical profile URL of the first profile link in the card.
    pub url: String,
    /// Serialized HTML of the card container.
    pub markup: String,
}

/// Group profile links into cards, in document order.
///
/// Each link climbs to its nearest ancestor matching the highest-priority
/// container marker. Links sharing a container collapse into one card.
/// Links with no recognizable container are dropped.
pub fn extract_cards(html: &str, page_url: &str, profile_marker: &str) -> Vec<CardHandle> {
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen_containers = HashSet::new();
    let mut cards = Vec::new();

    for link in document.select(&anchor_selector) {
        let href = link.value().attr("href").unwrap_or_default();
        if !href.contains(profile_marker) {
            continue;
        }
        let Some(url) = normalize_profile_url(href, base.as_ref()) else {
            continue;
        };
        if !url.contains(profile_marker) {
            continue;
        }
        let Some(container) = closest_container(&link) else {
            continue;
        };
        if !seen_containers.insert(container.id()) {
            continue;
        }
        cards.push(CardHandle {
            url,
            markup: container.html(),
        });
    }

    cards
}

fn closest_container<'a>(link: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    CARD_CONTAINERS
        .iter()
        .find_map(|marker| nearest_ancestor(link, marker))
}

fn nearest_ancestor<'a>(element: &ElementRef<'a>, marker: &ContainerMarker) -> Option<ElementRef<'a>> {
    let mut current = element.parent();
    while let Some(node) = current {
        if let Some(el) = ElementRef::wrap(node) {
            if marker.matches(&el) {
                return Some(el);
            }
        }
        current = node.parent();
    }
    None
}
