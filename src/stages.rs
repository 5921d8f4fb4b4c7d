use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::aggregate::{
    KPI_METRICS, SnapshotTag, TEAM_GROUP_COLUMNS, TEAM_STAT_COLUMNS, build_league_kpis,
    build_standings_gold, build_team_totals, league_history_schema, league_kpis_schema,
};
use crate::blob_store::BlobStore;
use crate::history::{HistoryOutcome, HistoryRequest, build_league_season_history};
use crate::season::{Season, format_asof};
use crate::snapshot_store::{
    ENDPOINT_GAME_LOG, ENDPOINT_STANDINGS, GoldTable, SnapshotStore, gold_key, history_key, raw_key,
};
use crate::stats_api::StatsSource;

#[derive(Debug, Clone)]
pub struct PullSummary {
    pub season: Season,
    pub asof: NaiveDate,
    pub game_rows: usize,
    pub standings_rows: usize,
    pub keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GoldSummary {
    pub season: Season,
    pub asof: NaiveDate,
    pub teams: usize,
    pub standings_rows: usize,
    pub keys: Vec<String>,
}

pub fn pull_raw<S: StatsSource, B: BlobStore>(
    source: &S,
    store: &SnapshotStore<B>,
    season: &Season,
    asof: NaiveDate,
) -> Result<PullSummary> {
    info!(season = %season, asof = %format_asof(asof), "pull started");

    let games = source
        .fetch_game_log(season)
        .with_context(|| format!("fetch game log for {season}"))?;
    info!(
        rows = games.len(),
        cols = games.columns().len(),
        columns = ?games.columns(),
        "game log fetched"
    );
    if games.is_empty() {
        warn!(season = %season, "game log is empty");
    }
    store
        .write_raw(season, ENDPOINT_GAME_LOG, asof, &games)
        .context("write raw game log")?;

    let standings = source
        .fetch_standings(season)
        .with_context(|| format!("fetch standings for {season}"))?;
    info!(
        rows = standings.len(),
        cols = standings.columns().len(),
        "standings fetched"
    );
    store
        .write_raw(season, ENDPOINT_STANDINGS, asof, &standings)
        .context("write raw standings")?;

    Ok(PullSummary {
        season: *season,
        asof,
        game_rows: games.len(),
        standings_rows: standings.len(),
        keys: vec![
            raw_key(season, ENDPOINT_GAME_LOG, asof),
            raw_key(season, ENDPOINT_STANDINGS, asof),
        ],
    })
}

pub fn build_gold<B: BlobStore>(
    store: &SnapshotStore<B>,
    season: &Season,
    asof: NaiveDate,
) -> Result<GoldSummary> {
    info!(season = %season, asof = %format_asof(asof), "gold build started");

    let games = store
        .read_raw(season, ENDPOINT_GAME_LOG, asof)
        .context("read raw game log")?;
    info!(rows = games.len(), cols = games.columns().len(), "raw games loaded");
    let standings = store
        .read_raw(season, ENDPOINT_STANDINGS, asof)
        .context("read raw standings")?;
    info!(rows = standings.len(), cols = standings.columns().len(), "raw standings loaded");

    let tag = SnapshotTag::new(*season, asof);
    let team_totals = build_team_totals(&games, &TEAM_STAT_COLUMNS, &TEAM_GROUP_COLUMNS, &tag)
        .context("aggregate team totals")?;
    let kpis = build_league_kpis(&games, &KPI_METRICS, &tag).context("aggregate league kpis")?;
    let standings_gold = build_standings_gold(&standings, &tag);

    store.write_table_with(
        &gold_key(season, GoldTable::Kpis),
        &kpis,
        &league_kpis_schema(&KPI_METRICS),
    )?;
    store.write_gold(season, GoldTable::TeamTotals, &team_totals)?;
    store.write_gold(season, GoldTable::Standings, &standings_gold)?;

    Ok(GoldSummary {
        season: *season,
        asof,
        teams: team_totals.len(),
        standings_rows: standings_gold.len(),
        keys: GoldTable::ALL
            .iter()
            .map(|t| gold_key(season, *t))
            .collect(),
    })
}

pub fn build_history<B: BlobStore>(
    store: &SnapshotStore<B>,
    request: &HistoryRequest,
) -> Result<HistoryOutcome> {
    store.check_access().context("bucket access check")?;
    let outcome = build_league_season_history(store, request)?;
    store
        .write_table_with(&history_key(), &outcome.table, &league_history_schema())
        .context("write league season history")?;

    info!(seasons = outcome.rows.len(), key = %history_key(), "history written");
    if !outcome.errors.is_empty() {
        warn!(failed = outcome.errors.len(), "history finished with season errors");
        for failure in outcome.errors.iter().take(10) {
            warn!(season = %failure.season, error = %failure.error, "season error");
        }
    }
    Ok(outcome)
}
