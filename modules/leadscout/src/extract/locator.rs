//! Declarative locators and the "first non-empty wins" combinator.
//!
//! Extraction policy is data: each field owns a ranked slice of [`Locator`]s.
//! Evaluation never fails. A locator that does not parse, does not match, or
//! matches only whitespace simply yields an empty string and the next one is
//! tried.

use scraper::{ElementRef, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Text of the first element matching a CSS selector.
    Css(&'static str),
    /// Text of the first element matching the selector whose text contains the needle.
    CssContaining(&'static str, &'static str),
}

impl Locator {
    /// Evaluate against `root`. Empty string on any miss.
    pub fn text_in(&self, root: ElementRef<'_>) -> String {
        match *self {
            Locator::Css(css) => match Selector::parse(css) {
                Ok(selector) => root
                    .select(&selector)
                    .map(element_text)
                    .next()
                    .unwrap_or_default(),
                Err(_) => String::new(),
            },
            Locator::CssContaining(css, needle) => match Selector::parse(css) {
                Ok(selector) => root
                    .select(&selector)
                    .map(element_text)
                    .find(|text| text.contains(needle))
                    .unwrap_or_default(),
                Err(_) => String::new(),
            },
        }
    }
}

/// Try each strategy in order; the first non-empty result wins.
pub fn first_non_empty<T, F>(strategies: &[T], mut attempt: F) -> String
where
    F: FnMut(&T) -> String,
{
    strategies
        .iter()
        .map(|s| attempt(s))
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// Evaluate a locator chain against `root`.
pub fn locate(root: ElementRef<'_>, chain: &[Locator]) -> String {
    first_non_empty(chain, |locator| locator.text_in(root))
}

/// Visible text of an element with runs of whitespace collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
