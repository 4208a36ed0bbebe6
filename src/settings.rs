use std::path::Path;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::error::{Result, ScrapeError};

const DEFAULT_FILE: &str = "tmobile_scraper";
const ENV_PREFIX: &str = "TMO";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 10 digit T-Mobile US telephone number.
    #[serde(default)]
    pub phone_number: String,
    /// my.t-mobile.com password for the above number.
    #[serde(default)]
    pub password: String,
    /// Contact address appended to the User-Agent header.
    #[serde(default)]
    pub owner: String,
    /// `None` uses the system proxy settings, `Some("")` connects directly.
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_refresh_delay_secs")]
    pub max_refresh_delay_secs: u64,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default = "default_detail_sections")]
    pub detail_sections: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub portal: String,
    pub ebill: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            portal: "https://my.t-mobile.com".to_string(),
            ebill: "https://ebill.t-mobile.com".to_string(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_refresh_delay_secs() -> u64 {
    10
}

fn default_detail_sections() -> Vec<String> {
    [
        "LocalAirtimeDetailData",
        "MessagingChargesDetailData",
        "DataServiceChargesDetailData",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Settings {
    /// Load settings from an optional file and `TMO_*` environment variables.
    ///
    /// An explicit `path` must exist; otherwise `tmobile_scraper.{toml,yaml,json}`
    /// in the working directory is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        let builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let required = [
            (&self.phone_number, "phone_number", "TMO_PHONE_NUMBER"),
            (&self.password, "password", "TMO_PASSWORD"),
            (&self.owner, "owner", "TMO_OWNER"),
        ];
        for (value, key, env) in required {
            if value.trim().is_empty() {
                return Err(ScrapeError::MissingSetting { key, env });
            }
        }
        Ok(())
    }

    pub fn user_agent(&self) -> String {
        format!("Mozilla/5.0 (X11; U; Linux i686; en-US; rv 1.0) {}", self.owner)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn max_refresh_delay(&self) -> Duration {
        Duration::from_secs(self.max_refresh_delay_secs)
    }
}
