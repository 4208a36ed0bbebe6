use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html};

use super::{collapse_ws, has_class};
use crate::error::{Result, ScrapeError};

static BILL_DATE_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Bill\s+date:").unwrap());
static BILL_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Bill\s+date:\s*\w{3} (\w{3} \d{2}) \d{2}:\d{2}:\d{2} \w{3} (\d{4})").unwrap()
});
static VIEW_BILL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"View\s+Bill").unwrap());

const SELECTED_CLASS: &str = "selectedbill";
const LABEL_FORMAT: &str = "%b %d %Y";
const QUERY_FORMATS: &[&str] = &[
    LABEL_FORMAT,
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

#[derive(Debug, Clone, PartialEq)]
pub enum CycleLink {
    /// The cycle is the one already rendered on the selection page.
    Current,
    /// Page-relative link that switches the session to this cycle.
    Href(String),
}

#[derive(Debug, Clone)]
pub struct BillCycle {
    pub label: String,
    pub date: Option<NaiveDate>,
    pub link: CycleLink,
}

impl BillCycle {
    pub fn is_current(&self) -> bool {
        self.link == CycleLink::Current
    }
}

/// Bill cycles in the order the selection page lists them.
#[derive(Debug, Clone, Default)]
pub struct BillCycles {
    cycles: Vec<BillCycle>,
}

impl BillCycles {
    fn insert(&mut self, cycle: BillCycle) {
        match self.cycles.iter_mut().find(|c| c.label == cycle.label) {
            Some(existing) => existing.link = cycle.link,
            None => self.cycles.push(cycle),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BillCycle> {
        self.cycles.iter()
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Match a user-supplied date against the listed cycles.
    ///
    /// Exact labels win (`Mar 02 2010`); otherwise the query is read as a
    /// calendar date in a few common formats (`2010-03-02`, `03/02/2010`, ...).
    pub fn find(&self, query: &str) -> Option<&BillCycle> {
        let wanted = collapse_ws(query);
        if let Some(c) = self.cycles.iter().find(|c| c.label.eq_ignore_ascii_case(&wanted)) {
            return Some(c);
        }
        let date = QUERY_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(&wanted, f).ok())?;
        self.cycles.iter().find(|c| c.date == Some(date))
    }

    pub fn require(&self, query: &str) -> Result<&BillCycle> {
        self.find(query)
            .ok_or_else(|| ScrapeError::UnknownBillDate(query.to_string()))
    }
}

/// Build the cycle index from the bill selection page.
///
/// Each `Bill date:` text is tied to the nearest enclosing element that is
/// either the selected cycle or holds a `View Bill` link. The search never
/// climbs past an `<li>`, since the parent list holds the other months.
pub fn parse_bill_cycles(doc: &Html) -> Result<BillCycles> {
    let mut cycles = BillCycles::default();

    for node in doc.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        if !BILL_DATE_TEXT_RE.is_match(text) {
            continue;
        }

        let label = cycle_label(text);
        let link = match node.parent().and_then(ElementRef::wrap) {
            Some(parent) => locate_link(parent, &label)?,
            None => return Err(ScrapeError::BillCycleLinkMissing(label)),
        };
        let date = NaiveDate::parse_from_str(&label, LABEL_FORMAT).ok();
        cycles.insert(BillCycle { label, date, link });
    }

    Ok(cycles)
}

/// `Bill date: Tue Mar 02 00:00:00 EST 2010` -> `Mar 02 2010`.
fn cycle_label(text: &str) -> String {
    match BILL_DATE_RE.captures(text) {
        Some(caps) => format!("{} {}", &caps[1], &caps[2]),
        None => collapse_ws(text),
    }
}

fn locate_link(start: ElementRef, label: &str) -> Result<CycleLink> {
    let missing = || ScrapeError::BillCycleLinkMissing(label.to_string());

    for el in std::iter::once(start).chain(start.ancestors().filter_map(ElementRef::wrap)) {
        if has_class(&el, SELECTED_CLASS) {
            return Ok(CycleLink::Current);
        }

        if let Some(view) = find_view_bill(el) {
            let href = std::iter::once(view)
                .chain(view.ancestors().filter_map(ElementRef::wrap))
                .find(|a| a.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
                .ok_or_else(missing)?;
            return Ok(CycleLink::Href(href.trim().to_string()));
        }

        if el.value().name() == "li" {
            return Err(missing());
        }
    }

    Err(missing())
}

/// Element directly holding a `View Bill` text somewhere under `el`.
fn find_view_bill(el: ElementRef) -> Option<ElementRef> {
    el.descendants().filter_map(ElementRef::wrap).find(|e| {
        e.children()
            .filter_map(|c| c.value().as_text())
            .any(|t| VIEW_BILL_RE.is_match(t))
    })
}
