//! Candidate extraction from rendered listing and detail pages.
//!
//! Platform markup drifts, so every field is located through a ranked chain
//! of independent locators instead of a single selector.

pub mod cards;
pub mod fields;
pub mod listing;
pub mod locator;

pub use cards::{extract_cards, CardHandle, ContainerMarker, CARD_CONTAINERS};
pub use fields::{
    extract_detail_fields, extract_fields, has_open_to_work_badge, ExtractedFields, FieldChains,
    CARD_FIELDS, DETAIL_FIELDS,
};
pub use listing::{lazy_load_script, ListingQuery, RESULT_SELECTORS};
pub use locator::{first_non_empty, locate, Locator};
