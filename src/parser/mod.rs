pub mod bill;
pub mod cycles;
pub mod login;
pub mod refresh;
pub mod summary;

use scraper::ElementRef;

/// Collapse runs of whitespace (including `&nbsp;`) into single spaces.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-blank text node directly under `el`, falling back to all of its text.
pub fn own_text(el: &ElementRef) -> String {
    el.children()
        .filter_map(|n| n.value().as_text())
        .map(|t| t.trim())
        .find(|t| !t.is_empty())
        .map(collapse_ws)
        .unwrap_or_else(|| collapse_ws(&el.text().collect::<String>()))
}

pub fn has_class(el: &ElementRef, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}
