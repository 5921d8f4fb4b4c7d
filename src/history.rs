use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use tracing::{error, info};

use crate::aggregate::{LeagueSeasonRow, build_league_season_row, league_history_table};
use crate::blob_store::BlobStore;
use crate::season::{Season, format_asof};
use crate::snapshot_store::{ENDPOINT_GAME_LOG, SnapshotStore};
use crate::table::Table;

#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub season_min: Option<Season>,
    pub season_max: Option<Season>,
    pub endpoint: String,
    pub asof: Option<NaiveDate>,
}

impl Default for HistoryRequest {
    fn default() -> Self {
        Self {
            season_min: None,
            season_max: None,
            endpoint: ENDPOINT_GAME_LOG.to_string(),
            asof: None,
        }
    }
}

impl HistoryRequest {
    fn includes(&self, season: &Season) -> bool {
        if self.season_min.is_some_and(|min| *season < min) {
            return false;
        }
        if self.season_max.is_some_and(|max| *season > max) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct SeasonFailure {
    pub season: Season,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct HistoryOutcome {
    pub rows: Vec<LeagueSeasonRow>,
    pub errors: Vec<SeasonFailure>,
    pub table: Table,
}

/// Seasons that cannot be loaded are recorded in `errors` and skipped. Fails
/// only when no season is discovered or none produced a row.
pub fn build_league_season_history<B: BlobStore>(
    store: &SnapshotStore<B>,
    request: &HistoryRequest,
) -> Result<HistoryOutcome> {
    let discovered = store.discover_seasons()?;
    if discovered.is_empty() {
        return Err(anyhow!(
            "no seasons found under {}/gold/season=...",
            store.blobs().describe()
        ));
    }

    let seasons = discovered
        .into_iter()
        .filter(|s| request.includes(s))
        .collect::<Vec<_>>();
    info!(
        count = seasons.len(),
        seasons = ?seasons.iter().map(Season::to_string).collect::<Vec<_>>(),
        "seasons to process"
    );

    let mut rows = Vec::new();
    let mut errors = Vec::new();
    for season in seasons {
        match season_row(store, &season, request) {
            Ok(row) => {
                info!(
                    season = %season,
                    asof = %format_asof(row.asof),
                    games = ?row.games,
                    pts = ?row.total("PTS"),
                    fg3m = ?row.total("FG3M"),
                    fg3a = ?row.total("FG3A"),
                    "season ok"
                );
                rows.push(row);
            }
            Err(err) => {
                error!(season = %season, error = %format!("{err:#}"), "season failed");
                errors.push(SeasonFailure {
                    season,
                    error: format!("{err:#}"),
                });
            }
        }
    }

    if rows.is_empty() {
        return Err(anyhow!(
            "no history rows produced ({} seasons failed)",
            errors.len()
        ));
    }

    rows.sort_by_key(|r| r.season);
    let table = league_history_table(&rows)?;
    Ok(HistoryOutcome {
        rows,
        errors,
        table,
    })
}

fn season_row<B: BlobStore>(
    store: &SnapshotStore<B>,
    season: &Season,
    request: &HistoryRequest,
) -> Result<LeagueSeasonRow> {
    let asof = match request.asof {
        Some(asof) => asof,
        None => store
            .discover_asof_dates(season, &request.endpoint)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                anyhow!(
                    "no raw snapshots for season={season} endpoint={}",
                    request.endpoint
                )
            })?,
    };
    let games = store.read_raw(season, &request.endpoint, asof)?;
    info!(
        season = %season,
        endpoint = %request.endpoint,
        rows = games.len(),
        cols = games.columns().len(),
        asof = %format_asof(asof),
        "raw loaded"
    );
    Ok(build_league_season_row(&games, *season, asof))
}
