use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use super::own_text;
use crate::error::{Result, ScrapeError};

static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#tblMinuteUsageSummary").unwrap());
static SERVICE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".ubmu_service").unwrap());
static USED_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".ubmu_used").unwrap());
static INCLUDED_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".ubmu_included").unwrap());

/// One row of the unbilled usage table, e.g. `Whenever Minutes: 312 / 500`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageLine {
    pub service: String,
    pub used: String,
    pub included: String,
}

impl fmt::Display for UsageLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} / {}", self.service, self.used, self.included)
    }
}

pub fn parse_usage_summary(doc: &Html) -> Result<Vec<UsageLine>> {
    let table = doc
        .select(&TABLE_SEL)
        .next()
        .ok_or(ScrapeError::SummaryTableMissing)?;

    table
        .select(&SERVICE_SEL)
        .map(|service_cell| -> Result<UsageLine> {
            let service = own_text(&service_cell);
            let row = service_cell
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "tr");
            let cell = |sel: &Selector, class: &'static str| {
                row.and_then(|r| r.select(sel).next())
                    .map(|c| own_text(&c))
                    .ok_or_else(|| ScrapeError::SummaryCellMissing {
                        service: service.clone(),
                        class,
                    })
            };
            Ok(UsageLine {
                used: cell(&USED_SEL, "ubmu_used")?,
                included: cell(&INCLUDED_SEL, "ubmu_included")?,
                service,
            })
        })
        .collect()
}
