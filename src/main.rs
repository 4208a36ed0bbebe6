mod error;
mod parser;
mod portal;
mod session;
mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use parser::bill::strip_detail_sections;
use portal::Portal;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "tmobile_scraper",
    about = "T-Mobile online account management scraper",
    after_help = "Credentials are read from tmobile_scraper.toml or TMO_PHONE_NUMBER, TMO_PASSWORD and TMO_OWNER."
)]
struct Cli {
    /// Omit detail when retrieving full bill
    #[arg(short = 'D', long, conflicts_with = "summary")]
    skip_detail: bool,

    /// List available bill dates
    #[arg(short, long, conflicts_with_all = ["summary", "date"])]
    list: bool,

    /// Display account summary
    #[arg(short, long, conflicts_with = "date")]
    summary: bool,

    /// Print list and summary results as JSON
    #[arg(long)]
    json: bool,

    /// Settings file (default: ./tmobile_scraper.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bill date as shown by --list, e.g. "Mar 02 2010"
    #[arg(value_name = "DATE", required_unless_present_any = ["list", "summary"])]
    date: Vec<String>,
}

#[derive(Debug, PartialEq)]
enum Mode {
    List,
    Summary,
    Bill { date: String, skip_detail: bool },
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.list {
            Mode::List
        } else if self.summary {
            Mode::Summary
        } else {
            Mode::Bill {
                date: self.date.join(" "),
                skip_detail: self.skip_detail,
            }
        }
    }
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .init();
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    init_tracing(settings.debug);

    let pb = spinner();
    let result = run(&cli, &settings, &pb).await;
    pb.finish_and_clear();
    result
}

async fn run(cli: &Cli, settings: &Settings, pb: &ProgressBar) -> anyhow::Result<()> {
    pb.set_message("Logging in to my.t-mobile.com");
    let portal = Portal::login(settings).await.context("failed to log in")?;

    match cli.mode() {
        Mode::Summary => {
            pb.set_message("Fetching usage summary");
            let lines = portal
                .usage_summary()
                .await
                .context("failed to read usage summary")?;
            pb.finish_and_clear();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&lines)?);
            } else {
                for line in &lines {
                    println!("{}", line);
                }
            }
        }
        Mode::List => {
            pb.set_message("Fetching bill cycles");
            let cycles = portal
                .bill_cycles()
                .await
                .context("failed to read bill cycles")?;
            pb.finish_and_clear();
            if cycles.is_empty() {
                warn!("bill selection page listed no bill cycles");
            }

            if cli.json {
                let rows: Vec<_> = cycles
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "label": c.label,
                            "date": c.date,
                            "current": c.is_current(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for cycle in cycles.iter() {
                    println!("{}", cycle.label);
                }
            }
        }
        Mode::Bill { date, skip_detail } => {
            pb.set_message("Fetching bill cycles");
            let cycles = portal
                .bill_cycles()
                .await
                .context("failed to read bill cycles")?;
            let cycle = cycles.require(&date)?;

            pb.set_message(format!("Fetching bill for {}", cycle.label));
            let bill = portal
                .printable_bill(cycle)
                .await
                .with_context(|| format!("failed to fetch bill for {}", cycle.label))?;
            pb.finish_and_clear();

            if skip_detail {
                println!("{}", strip_detail_sections(&bill.body, &settings.detail_sections)?);
            } else {
                println!("{}", bill.body);
            }
        }
    }

    Ok(())
}
