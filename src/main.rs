mod config;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::models::Identifier;
use crate::pipeline::{BatchReport, Pipeline};
use crate::scraper::parsers::parse_detail;
use crate::utils::StageTimer;

#[derive(Parser)]
#[command(name = "b4e-etl", about = "brazil4export company directory ETL", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Walk the search listing and write the company id set
    List {
        /// Number of listing pages to walk (default: pipeline.page_count)
        #[arg(short, long)]
        pages: Option<u32>,
    },

    /// Download the detail page of every listed company
    Fetch,

    /// Parse saved detail pages into JSON records
    Parse,

    /// Post parsed records to the document store
    Load,

    /// Run list, fetch, parse and load in order
    Run {
        #[arg(short, long)]
        pages: Option<u32>,
    },

    /// Parse one saved detail page and print it
    Show {
        /// Company id
        id: String,
    },

    /// Show artifact counts
    Stats,
}

fn print_failures(report: &BatchReport) {
    for failure in &report.failures {
        println!("  {} {}: {}", report.stage, failure.id, failure.reason);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "b4e_etl=info,warn",
        1 => "b4e_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Command::List { pages } => {
            let mut timer = StageTimer::start("Listing");
            let ids = pipeline.list(pages).await?;
            timer.records(ids.len());
        }

        Command::Fetch => {
            let mut timer = StageTimer::start("Detail fetch");
            let report = pipeline.fetch().await?;
            timer.records(report.attempted());
            print_failures(&report);
        }

        Command::Parse => {
            let mut timer = StageTimer::start("Detail parse");
            let report = pipeline.parse()?;
            timer.records(report.attempted());
            print_failures(&report);
        }

        Command::Load => {
            let mut timer = StageTimer::start("Load");
            let report = pipeline.load().await?;
            timer.records(report.attempted());
            print_failures(&report);
        }

        Command::Run { pages } => {
            let mut timer = StageTimer::start("Full run");
            let stats = pipeline.run(pages).await?;
            timer.records(stats.ids_discovered);
            for report in [&stats.fetch, &stats.parse, &stats.load] {
                print_failures(report);
            }
            info!(
                "Done: {} ids | {} fetched | {} parsed | {} loaded",
                stats.ids_discovered, stats.fetch.succeeded, stats.parse.succeeded, stats.load.succeeded
            );
        }

        Command::Show { id } => {
            let id = Identifier::new(id);
            let html = pipeline.artifacts().read_html(&id)?;
            let record = parse_detail(&id, &html)?;
            println!("{}", record);
        }

        Command::Stats => {
            let artifacts = pipeline.artifacts();
            let ids = if artifacts.has_ids() { artifacts.load_ids()?.len() } else { 0 };
            let pages = artifacts.html_ids()?.len();
            let records = artifacts.json_ids()?.len();
            println!("─────────────────────────────────");
            println!("  brazil4export ETL — Artifacts");
            println!("─────────────────────────────────");
            println!("  Listed ids   : {}", ids);
            println!("  Saved pages  : {}", pages);
            println!("  JSON records : {}", records);
            println!("─────────────────────────────────");
        }
    }

    Ok(())
}
