use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::blob_store::BlobStore;
use crate::error::{Error, Result};
use crate::parquet_codec::{decode_table, encode_table_with};
use crate::season::{Season, format_asof, parse_asof};
use crate::table::{ColumnKind, Table};

pub const ENDPOINT_GAME_LOG: &str = "leaguegamelog";
pub const ENDPOINT_STANDINGS: &str = "leaguestandingsv3";

const RAW_ROOT: &str = "raw";
const GOLD_ROOT: &str = "gold";
const HISTORY_TABLE: &str = "league_season_kpis";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoldTable {
    Kpis,
    TeamTotals,
    Standings,
}

impl GoldTable {
    pub const ALL: [GoldTable; 3] = [GoldTable::Kpis, GoldTable::TeamTotals, GoldTable::Standings];

    pub fn name(self) -> &'static str {
        match self {
            GoldTable::Kpis => "kpis",
            GoldTable::TeamTotals => "team_totals",
            GoldTable::Standings => "standings",
        }
    }
}

pub fn raw_key(season: &Season, endpoint: &str, asof: NaiveDate) -> String {
    format!(
        "{RAW_ROOT}/season={season}/endpoint={endpoint}/asof={}/data",
        format_asof(asof)
    )
}

pub fn gold_key(season: &Season, table: GoldTable) -> String {
    format!("{GOLD_ROOT}/season={season}/{}", table.name())
}

pub fn history_key() -> String {
    format!("{GOLD_ROOT}/{HISTORY_TABLE}")
}

fn raw_endpoint_prefix(season: &Season, endpoint: &str) -> String {
    format!("{RAW_ROOT}/season={season}/endpoint={endpoint}/")
}

fn segment_value<'a>(key: &'a str, name: &str) -> Option<&'a str> {
    key.split('/').find_map(|seg| {
        seg.strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
    })
}

pub struct SnapshotStore<B: BlobStore> {
    blobs: B,
}

impl<B: BlobStore> SnapshotStore<B> {
    pub fn new(blobs: B) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Lists the bucket root once so credential or permission problems show
    /// up before any work is done. An empty bucket passes.
    pub fn check_access(&self) -> Result<()> {
        let keys = self.blobs.list_keys_with_prefix("")?;
        info!(
            location = %self.blobs.describe(),
            objects = keys.len(),
            "bucket list ok"
        );
        Ok(())
    }

    pub fn discover_seasons(&self) -> Result<Vec<Season>> {
        let prefix = format!("{GOLD_ROOT}/");
        let keys = self.blobs.list_keys_with_prefix(&prefix)?;
        let mut seasons = BTreeSet::new();
        for key in &keys {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            // Only the immediate child directory counts.
            let Some((child, _)) = rest.split_once('/') else {
                continue;
            };
            let Some(token) = child.strip_prefix("season=") else {
                continue;
            };
            match token.parse::<Season>() {
                Ok(season) => {
                    seasons.insert(season);
                }
                Err(_) => debug!(key = %key, "skipping malformed season segment"),
            }
        }
        Ok(seasons.into_iter().rev().collect())
    }

    pub fn discover_asof_dates(&self, season: &Season, endpoint: &str) -> Result<Vec<NaiveDate>> {
        let keys = self
            .blobs
            .list_keys_with_prefix(&raw_endpoint_prefix(season, endpoint))?;
        let dates = keys
            .iter()
            .filter_map(|key| segment_value(key, "asof"))
            .filter_map(parse_asof)
            .collect::<BTreeSet<_>>();
        Ok(dates.into_iter().rev().collect())
    }

    pub fn read_table(&self, key: &str) -> Result<Table> {
        let bytes = self.blobs.get(key)?;
        let table = decode_table(bytes).map_err(|err| Error::Storage {
            key: key.to_string(),
            message: format!("decode failed: {err}"),
        })?;
        debug!(key, rows = table.len(), cols = table.columns().len(), "table read");
        Ok(table)
    }

    pub fn write_table(&self, key: &str, table: &Table) -> Result<()> {
        self.write_table_with(key, table, &[])
    }

    pub fn write_table_with(
        &self,
        key: &str,
        table: &Table,
        declared: &[(String, ColumnKind)],
    ) -> Result<()> {
        let bytes = encode_table_with(table, declared)?;
        self.blobs.put(key, &bytes)?;
        info!(
            location = %self.blobs.describe(),
            key,
            rows = table.len(),
            bytes = bytes.len(),
            "table written"
        );
        Ok(())
    }

    pub fn read_raw(&self, season: &Season, endpoint: &str, asof: NaiveDate) -> Result<Table> {
        self.read_table(&raw_key(season, endpoint, asof))
    }

    pub fn write_raw(
        &self,
        season: &Season,
        endpoint: &str,
        asof: NaiveDate,
        table: &Table,
    ) -> Result<()> {
        self.write_table(&raw_key(season, endpoint, asof), table)
    }

    pub fn read_gold(&self, season: &Season, table: GoldTable) -> Result<Table> {
        self.read_table(&gold_key(season, table))
    }

    pub fn write_gold(&self, season: &Season, kind: GoldTable, table: &Table) -> Result<()> {
        self.write_table(&gold_key(season, kind), table)
    }

    pub fn read_optional(&self, key: &str) -> Result<Option<Table>> {
        match self.read_table(key) {
            Ok(table) => Ok(Some(table)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let season = Season::from_start_year(2024);
        let asof = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
        assert_eq!(
            raw_key(&season, ENDPOINT_GAME_LOG, asof),
            "raw/season=2024-25/endpoint=leaguegamelog/asof=2025-02-10/data"
        );
        assert_eq!(gold_key(&season, GoldTable::Kpis), "gold/season=2024-25/kpis");
        assert_eq!(
            gold_key(&season, GoldTable::TeamTotals),
            "gold/season=2024-25/team_totals"
        );
        assert_eq!(history_key(), "gold/league_season_kpis");
    }

    #[test]
    fn segment_values() {
        let key = "raw/season=2024-25/endpoint=leaguegamelog/asof=2025-02-10/data";
        assert_eq!(segment_value(key, "asof"), Some("2025-02-10"));
        assert_eq!(segment_value(key, "season"), Some("2024-25"));
        assert_eq!(segment_value(key, "missing"), None);
    }
}
