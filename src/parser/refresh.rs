use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

static META_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[http-equiv][content]").unwrap());
static CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*(\d+)(?:\.\d*)?\s*[;,]?\s*(?:url\s*=\s*)?['"]?([^'"]*)['"]?\s*$"#).unwrap()
});

/// Parse `<meta http-equiv="refresh" content="5; url=...">` into a delay and absolute target.
///
/// Returns `None` for refreshes that only reload the current page.
pub fn meta_refresh(doc: &Html, base: &Url) -> Option<(Duration, Url)> {
    let content = doc
        .select(&META_SEL)
        .find(|m| {
            m.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
        })?
        .value()
        .attr("content")?;

    parse_refresh_content(content, base)
}

/// Parse a refresh value (`Refresh:` header or meta `content`), resolving the target against `base`.
pub fn parse_refresh_content(content: &str, base: &Url) -> Option<(Duration, Url)> {
    let caps = CONTENT_RE.captures(content)?;
    let secs: u64 = caps[1].parse().ok()?;
    let target = caps[2].trim();
    if target.is_empty() {
        return None;
    }
    let url = base.join(target).ok()?;
    Some((Duration::from_secs(secs), url))
}
