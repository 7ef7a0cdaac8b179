use scraper::Html;

use super::cards::CardHandle;
use super::locator::{locate, Locator};

/// Ranked locator chains, one per field.
#[derive(Debug, Clone, Copy)]
pub struct FieldChains {
    pub name: &'static [Locator],
    pub headline: &'static [Locator],
    pub location: &'static [Locator],
}

/// Locators for a listing-page result card.
pub const CARD_FIELDS: FieldChains = FieldChains {
    name: &[
        Locator::Css("span.entity-result__title-text a span[aria-hidden='true']"),
        Locator::Css("span[dir='ltr']"),
    ],
    headline: &[
        Locator::Css("div.entity-result__primary-subtitle"),
        Locator::Css("div.t-14.t-normal.t-black"),
    ],
    location: &[
        Locator::Css("div.entity-result__secondary-subtitle"),
        Locator::Css("div.t-12.t-normal.t-black--light"),
        Locator::Css("span[data-anonymize='location']"),
    ],
};

/// Locators for a profile detail page.
pub const DETAIL_FIELDS: FieldChains = FieldChains {
    name: &[
        Locator::Css("h1"),
        Locator::Css("div.ph5 h1"),
        Locator::Css("[data-test-profile-card-headline] h1"),
    ],
    headline: &[
        Locator::Css("div.text-body-medium.break-words"),
        Locator::Css("div.text-body-medium"),
        Locator::Css("div.pv-text-details__left-panel > div:first-child"),
    ],
    location: &[
        Locator::Css("span.text-body-small.inline.t-black--light.break-words"),
        Locator::CssContaining("span.text-body-small", ","),
        Locator::Css("div.pv-text-details__left-panel span.text-body-small"),
    ],
};

/// Badge markers, matched case-insensitively against the card's serialized HTML.
pub const OPEN_TO_WORK_MARKERS: &[&str] = &["open to work", "opentowork", "open-to-work"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub name: String,
    pub headline: String,
    pub location: String,
    pub open_to_work: bool,
}

/// Extract fields from a card. Each field is independent; misses are empty.
pub fn extract_fields(card: &CardHandle) -> ExtractedFields {
    let fragment = Html::parse_fragment(&card.markup);
    let root = fragment.root_element();
    ExtractedFields {
        name: locate(root, CARD_FIELDS.name),
        headline: locate(root, CARD_FIELDS.headline),
        location: locate(root, CARD_FIELDS.location),
        open_to_work: has_open_to_work_badge(&card.markup),
    }
}

/// Extract name, headline and location from a rendered detail page.
pub fn extract_detail_fields(html: &str) -> ExtractedFields {
    let document = Html::parse_document(html);
    let root = document.root_element();
    ExtractedFields {
        name: locate(root, DETAIL_FIELDS.name),
        headline: locate(root, DETAIL_FIELDS.headline),
        location: locate(root, DETAIL_FIELDS.location),
        open_to_work: false,
    }
}

pub fn has_open_to_work_badge(markup: &str) -> bool {
    let lower = markup.to_lowercase();
    OPEN_TO_WORK_MARKERS.iter().any(|marker| lower.contains(marker))
}
