use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nba_gold::backfill::{BackfillPlan, PipelineStages, run_backfill};
use nba_gold::blob_store::BlobStore;
use nba_gold::config::{GlobalArgs, PipelineConfig};
use nba_gold::gold_export::export_gold_workbook;
use nba_gold::history::HistoryRequest;
use nba_gold::report::{DEFAULT_TOP_METRIC, DEFAULT_TOP_N, GoldView, ReportOptions, render_report};
use nba_gold::season::{Season, format_asof, today};
use nba_gold::snapshot_store::ENDPOINT_GAME_LOG;
use nba_gold::stages::{build_gold, build_history, pull_raw};
use nba_gold::stats_api::NbaStatsClient;

#[derive(Parser)]
#[command(name = "nba_gold")]
#[command(about = "NBA raw snapshots and gold aggregates on object storage", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the game log and standings for one season into raw snapshots
    Pull {
        #[arg(long)]
        season: Season,
        /// Capture date (default: today)
        #[arg(long)]
        asof: Option<NaiveDate>,
    },
    /// Build the gold tables of one season from its raw snapshots
    Aggregate {
        #[arg(long)]
        season: Season,
        /// Capture date of the raw snapshots to read (default: today)
        #[arg(long)]
        asof: Option<NaiveDate>,
    },
    /// Pull and aggregate a range of seasons by start year
    Backfill {
        #[arg(long)]
        from_year: i32,
        #[arg(long)]
        to_year: i32,
        #[arg(long)]
        asof: Option<NaiveDate>,
        /// Also process the season in progress
        #[arg(long)]
        include_current: bool,
    },
    /// Rebuild the league totals history across every season with gold output
    History {
        #[arg(long)]
        season_min: Option<Season>,
        #[arg(long)]
        season_max: Option<Season>,
        #[arg(long, default_value = ENDPOINT_GAME_LOG)]
        endpoint: String,
        /// Read this capture date instead of each season's newest one
        #[arg(long)]
        asof: Option<NaiveDate>,
    },
    /// Print the gold tables of one season (default: newest)
    Report {
        #[arg(long)]
        season: Option<Season>,
        /// Team totals column used for the ranking
        #[arg(long, default_value = DEFAULT_TOP_METRIC)]
        metric: String,
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
    },
    /// Write the gold tables of one season to an xlsx workbook
    Export {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        season: Option<Season>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let cli = Cli::parse();
    init_logging();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %format!("{err:#}"), "fatal");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` means the command finished but recorded failures.
fn run(cli: Cli) -> Result<bool> {
    let config = PipelineConfig::from_args(&cli.global).context("invalid configuration")?;
    let store = config.open_store()?;
    info!(
        location = %store.blobs().describe(),
        current_season = %config.current_season,
        "store opened"
    );

    match cli.command {
        Command::Pull { season, asof } => {
            let source = NbaStatsClient::new(&config)?;
            let summary = pull_raw(&source, &store, &season, asof.unwrap_or_else(today))?;
            println!("Raw snapshots written");
            println!("Season: {} asof {}", summary.season, format_asof(summary.asof));
            println!(
                "Rows: games={} standings={}",
                summary.game_rows, summary.standings_rows
            );
            for key in &summary.keys {
                println!("  {key}");
            }
            Ok(true)
        }
        Command::Aggregate { season, asof } => {
            let summary = build_gold(&store, &season, asof.unwrap_or_else(today))?;
            println!("Gold tables written");
            println!("Season: {} asof {}", summary.season, format_asof(summary.asof));
            println!(
                "Rows: teams={} standings={}",
                summary.teams, summary.standings_rows
            );
            for key in &summary.keys {
                println!("  {key}");
            }
            Ok(true)
        }
        Command::Backfill {
            from_year,
            to_year,
            asof,
            include_current,
        } => {
            let source = NbaStatsClient::new(&config)?;
            let plan = BackfillPlan {
                from_year,
                to_year,
                asof: asof.unwrap_or_else(today),
                include_current,
                current_season: config.current_season,
            };
            let mut stages = PipelineStages::new(&source, &store);
            let report = run_backfill(&plan, &mut stages)?;

            println!("Backfill complete");
            println!("Completed: {}", report.completed.len());
            for season in &report.skipped {
                println!("Skipped: {season} (current season)");
            }
            if !report.failures.is_empty() {
                println!("Failures:");
                for failure in &report.failures {
                    println!("  {} [{}]: {}", failure.season, failure.stage, failure.error);
                }
            }
            Ok(report.is_success())
        }
        Command::History {
            season_min,
            season_max,
            endpoint,
            asof,
        } => {
            let request = HistoryRequest {
                season_min,
                season_max,
                endpoint,
                asof,
            };
            let outcome = build_history(&store, &request)?;
            println!("League history written");
            println!("Seasons: {}", outcome.rows.len());
            if !outcome.errors.is_empty() {
                println!("Errors (first 10):");
                for failure in outcome.errors.iter().take(10) {
                    println!("  season {}: {}", failure.season, failure.error);
                }
            }
            Ok(true)
        }
        Command::Report {
            season,
            metric,
            top,
        } => {
            let view = GoldView::load(&store, season)?;
            print!("{}", render_report(&view, &ReportOptions { metric, top }));
            Ok(true)
        }
        Command::Export { out, season } => {
            let view = GoldView::load(&store, season)?;
            let report = export_gold_workbook(&out, &view)?;
            println!("Workbook written: {}", out.display());
            for sheet in &report.sheets {
                match sheet.rows {
                    Some(rows) => println!("  {}: {rows} rows", sheet.name),
                    None => println!("  {}: no data", sheet.name),
                }
            }
            Ok(true)
        }
    }
}
