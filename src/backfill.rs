use std::fmt;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::blob_store::BlobStore;
use crate::season::{Season, format_asof};
use crate::snapshot_store::SnapshotStore;
use crate::stages::{build_gold, pull_raw};
use crate::stats_api::StatsSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pull,
    Aggregate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Pull => f.write_str("pull_raw"),
            Stage::Aggregate => f.write_str("build_gold"),
        }
    }
}

pub trait SeasonStages {
    fn pull(&mut self, season: &Season, asof: NaiveDate) -> Result<()>;

    fn aggregate(&mut self, season: &Season, asof: NaiveDate) -> Result<()>;
}

pub struct PipelineStages<'a, S: StatsSource, B: BlobStore> {
    source: &'a S,
    store: &'a SnapshotStore<B>,
}

impl<'a, S: StatsSource, B: BlobStore> PipelineStages<'a, S, B> {
    pub fn new(source: &'a S, store: &'a SnapshotStore<B>) -> Self {
        Self { source, store }
    }
}

impl<S: StatsSource, B: BlobStore> SeasonStages for PipelineStages<'_, S, B> {
    fn pull(&mut self, season: &Season, asof: NaiveDate) -> Result<()> {
        pull_raw(self.source, self.store, season, asof).map(|_| ())
    }

    fn aggregate(&mut self, season: &Season, asof: NaiveDate) -> Result<()> {
        build_gold(self.store, season, asof).map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct BackfillPlan {
    pub from_year: i32,
    pub to_year: i32,
    pub asof: NaiveDate,
    pub include_current: bool,
    pub current_season: Season,
}

impl BackfillPlan {
    pub fn seasons(&self) -> impl Iterator<Item = Season> {
        (self.from_year..=self.to_year).map(Season::from_start_year)
    }
}

#[derive(Debug, Clone)]
pub struct StageFailure {
    pub season: Season,
    pub stage: Stage,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BackfillReport {
    pub completed: Vec<Season>,
    pub skipped: Vec<Season>,
    pub failures: Vec<StageFailure>,
}

impl BackfillReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pulls and aggregates every season of the plan in order. A failing stage
/// is recorded and the run moves on to the next season; aggregation only
/// runs after a successful pull.
pub fn run_backfill(plan: &BackfillPlan, stages: &mut impl SeasonStages) -> Result<BackfillReport> {
    if plan.from_year > plan.to_year {
        return Err(anyhow!(
            "empty season range: from {} is after to {}",
            plan.from_year,
            plan.to_year
        ));
    }

    let mut report = BackfillReport::default();
    for season in plan.seasons() {
        if season == plan.current_season && !plan.include_current {
            warn!(season = %season, "skipping current season, pass --include-current to run it");
            report.skipped.push(season);
            continue;
        }

        info!(season = %season, asof = %format_asof(plan.asof), "season started");

        if let Err(err) = stages.pull(&season, plan.asof) {
            error!(season = %season, stage = %Stage::Pull, error = %format!("{err:#}"), "stage failed");
            report.failures.push(StageFailure {
                season,
                stage: Stage::Pull,
                error: format!("{err:#}"),
            });
            continue;
        }

        if let Err(err) = stages.aggregate(&season, plan.asof) {
            error!(season = %season, stage = %Stage::Aggregate, error = %format!("{err:#}"), "stage failed");
            report.failures.push(StageFailure {
                season,
                stage: Stage::Aggregate,
                error: format!("{err:#}"),
            });
            continue;
        }

        report.completed.push(season);
    }

    info!(
        completed = report.completed.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        "backfill done"
    );
    Ok(report)
}
