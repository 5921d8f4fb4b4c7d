use std::collections::HashSet;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;

use nba_gold::backfill::{BackfillPlan, PipelineStages, SeasonStages, Stage, run_backfill};
use nba_gold::blob_store::MemoryStore;
use nba_gold::season::Season;
use nba_gold::snapshot_store::{GoldTable, SnapshotStore};
use nba_gold::stats_api::StatsSource;
use nba_gold::table::{Cell, Table};

#[derive(Default)]
struct RecordingStages {
    fail_pull: HashSet<i32>,
    fail_aggregate: HashSet<i32>,
    calls: Vec<(Stage, Season)>,
}

impl SeasonStages for RecordingStages {
    fn pull(&mut self, season: &Season, _asof: NaiveDate) -> Result<()> {
        self.calls.push((Stage::Pull, *season));
        if self.fail_pull.contains(&season.start_year()) {
            return Err(anyhow!("stats api returned 500"));
        }
        Ok(())
    }

    fn aggregate(&mut self, season: &Season, _asof: NaiveDate) -> Result<()> {
        self.calls.push((Stage::Aggregate, *season));
        if self.fail_aggregate.contains(&season.start_year()) {
            return Err(anyhow!("raw snapshot missing"));
        }
        Ok(())
    }
}

fn plan(from_year: i32, to_year: i32, include_current: bool) -> BackfillPlan {
    BackfillPlan {
        from_year,
        to_year,
        asof: NaiveDate::from_ymd_opt(2025, 2, 10).unwrap(),
        include_current,
        current_season: Season::from_start_year(2024),
    }
}

#[test]
fn failing_season_does_not_stop_the_rest() {
    let mut stages = RecordingStages {
        fail_pull: HashSet::from([2019]),
        fail_aggregate: HashSet::from([2021]),
        ..RecordingStages::default()
    };
    let report = run_backfill(&plan(2018, 2022, false), &mut stages).unwrap();

    assert!(!report.is_success());
    assert_eq!(
        report.completed,
        vec![
            Season::from_start_year(2018),
            Season::from_start_year(2020),
            Season::from_start_year(2022),
        ]
    );
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].season, Season::from_start_year(2019));
    assert_eq!(report.failures[0].stage, Stage::Pull);
    assert_eq!(report.failures[1].stage, Stage::Aggregate);
    assert!(report.failures[1].error.contains("raw snapshot missing"));

    // A failed pull never reaches aggregation.
    assert!(
        !stages
            .calls
            .contains(&(Stage::Aggregate, Season::from_start_year(2019)))
    );
    assert_eq!(stages.calls.len(), 9);
}

#[test]
fn current_season_is_skipped_unless_included() {
    let mut stages = RecordingStages::default();
    let report = run_backfill(&plan(2023, 2024, false), &mut stages).unwrap();
    assert!(report.is_success());
    assert_eq!(report.completed, vec![Season::from_start_year(2023)]);
    assert_eq!(report.skipped, vec![Season::from_start_year(2024)]);
    assert!(stages.calls.iter().all(|(_, s)| s.start_year() == 2023));

    let mut stages = RecordingStages::default();
    let report = run_backfill(&plan(2023, 2024, true), &mut stages).unwrap();
    assert!(report.skipped.is_empty());
    assert_eq!(report.completed.len(), 2);
}

#[test]
fn inverted_range_is_rejected() {
    let mut stages = RecordingStages::default();
    assert!(run_backfill(&plan(2020, 2019, false), &mut stages).is_err());
    assert!(stages.calls.is_empty());
}

#[test]
fn stage_names_match_the_pipeline_steps() {
    assert_eq!(Stage::Pull.to_string(), "pull_raw");
    assert_eq!(Stage::Aggregate.to_string(), "build_gold");
}

struct CannedStats;

impl StatsSource for CannedStats {
    fn fetch_game_log(&self, season: &Season) -> Result<Table> {
        if season.start_year() == 2020 {
            return Err(anyhow!("timed out"));
        }
        Ok(Table::from_rows(
            ["GAME_ID", "TEAM_ABBREVIATION", "PTS"],
            vec![
                vec!["1".into(), "BOS".into(), Cell::Int(101)],
                vec!["1".into(), "MIA".into(), Cell::Int(99)],
            ],
        )?)
    }

    fn fetch_standings(&self, _season: &Season) -> Result<Table> {
        Ok(Table::from_rows(
            ["TeamName", "Conference", "PlayoffRank"],
            vec![
                vec!["Celtics".into(), "East".into(), Cell::Int(1)],
                vec!["Heat".into(), "East".into(), Cell::Int(2)],
            ],
        )?)
    }
}

#[test]
fn pipeline_stages_write_gold_for_each_completed_season() {
    let store = SnapshotStore::new(MemoryStore::new());
    let source = CannedStats;
    let mut stages = PipelineStages::new(&source, &store);
    let report = run_backfill(&plan(2019, 2021, false), &mut stages).unwrap();

    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].season, Season::from_start_year(2020));
    assert_eq!(
        store.discover_seasons().unwrap(),
        vec![Season::from_start_year(2021), Season::from_start_year(2019)]
    );

    let season = Season::from_start_year(2021);
    let kpis = store.read_gold(&season, GoldTable::Kpis).unwrap();
    assert_eq!(kpis.cell(0, "TOTAL_PTS"), Some(&Cell::Float(200.0)));
    let standings = store.read_gold(&season, GoldTable::Standings).unwrap();
    assert_eq!(standings.cell(1, "SEASON"), Some(&Cell::from("2021-22")));
}
