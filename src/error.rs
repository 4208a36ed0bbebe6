use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("settings error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("`{key}` is not set; add it to tmobile_scraper.toml or export {env}")]
    MissingSetting { key: &'static str, env: &'static str },

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{status}: {reason} ({url})")]
    Http {
        status: u16,
        reason: String,
        url: String,
    },

    #[error("unable to retrieve HTML for {page}, has my.t-mobile.com changed?")]
    NotHtml { page: &'static str },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unable to locate login form, has my.t-mobile.com changed?")]
    LoginFormMissing,

    #[error("login form has no `{0}` field, has my.t-mobile.com changed?")]
    LoginFieldMissing(String),

    #[error("login was rejected, check phone_number and password")]
    LoginRejected,

    #[error("unable to locate bill cycle selection URL for {0}")]
    BillCycleLinkMissing(String),

    #[error("no bill cycle matches `{0}`, run with --list to see available dates")]
    UnknownBillDate(String),

    #[error("usage summary table not found, has my.t-mobile.com changed?")]
    SummaryTableMissing,

    #[error("usage summary row for `{service}` has no `{class}` cell")]
    SummaryCellMissing { service: String, class: &'static str },

    #[error("printable bill has no `{0}` section")]
    DetailSectionMissing(String),
}
