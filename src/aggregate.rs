use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::season::{Season, format_asof};
use crate::table::{Cell, ColumnKind, ColumnsFolded, Table, bind_columns};

pub const TEAM_STAT_COLUMNS: [&str; 15] = [
    "PTS", "AST", "REB", "OREB", "DREB", "STL", "BLK", "TOV", "PF", "FGM", "FGA", "FG3M", "FG3A",
    "FTM", "FTA",
];
pub const TEAM_GROUP_COLUMNS: [&str; 3] = ["TEAM_ID", "TEAM_ABBREVIATION", "TEAM_NAME"];
pub const KPI_METRICS: [&str; 6] = ["PTS", "AST", "REB", "STL", "BLK", "TOV"];
pub const HISTORY_METRICS: [&str; 8] = ["PTS", "AST", "REB", "STL", "BLK", "TOV", "FG3M", "FG3A"];

pub const GAME_ID_COLUMN: &str = "GAME_ID";
pub const SEASON_TAG: &str = "SEASON";
pub const ASOF_TAG: &str = "ASOF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotTag {
    pub season: Season,
    pub asof: NaiveDate,
}

impl SnapshotTag {
    pub fn new(season: Season, asof: NaiveDate) -> Self {
        Self { season, asof }
    }

    fn apply(&self, table: &mut Table) {
        table.set_constant_column(ASOF_TAG, Cell::Text(format_asof(self.asof)));
        table.set_constant_column(SEASON_TAG, Cell::Text(self.season.to_string()));
    }
}

/// Running sum of one stat column. Stays integral while every contributing
/// cell is an integer; unparseable cells add nothing.
#[derive(Debug, Clone, Copy, Default)]
struct StatSum {
    ints: i64,
    floats: f64,
    widened: bool,
}

impl StatSum {
    fn add(&mut self, cell: &Cell) {
        match cell {
            Cell::Null => {}
            Cell::Int(v) => self.ints = self.ints.saturating_add(*v),
            other => {
                self.widened = true;
                if let Some(v) = other.as_f64() {
                    self.floats += v;
                }
            }
        }
    }

    fn into_cell(self) -> Cell {
        if self.widened {
            Cell::Float(self.ints as f64 + self.floats)
        } else {
            Cell::Int(self.ints)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
}

impl From<&Cell> for KeyPart {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => KeyPart::Null,
            Cell::Bool(b) => KeyPart::Bool(*b),
            Cell::Int(v) => KeyPart::Int(*v),
            Cell::Float(v) => KeyPart::Float(v.to_bits()),
            Cell::Text(s) => KeyPart::Text(s.clone()),
        }
    }
}

fn column_total(games: &Table, idx: usize) -> f64 {
    games
        .column_cells(idx)
        .filter_map(Cell::as_f64)
        .sum()
}

fn distinct_count(games: &Table, idx: usize) -> u64 {
    games
        .column_cells(idx)
        .filter(|c| !c.is_null())
        .map(Cell::render)
        .collect::<HashSet<_>>()
        .len() as u64
}

pub fn build_team_totals(
    games: &Table,
    numeric_cols: &[&str],
    group_cols: &[&str],
    tag: &SnapshotTag,
) -> Result<Table> {
    let group = bind_columns(games, group_cols);
    if group.is_empty() {
        return Err(Error::NoGroupColumns {
            expected: group_cols.iter().map(|c| c.to_string()).collect(),
        });
    }
    let stats = bind_columns(games, numeric_cols);

    let mut slots: HashMap<Vec<KeyPart>, usize> = HashMap::new();
    let mut groups: Vec<(Vec<Cell>, Vec<StatSum>)> = Vec::new();
    for row in games.rows() {
        let key_cells = group
            .iter()
            .map(|c| row[c.index].clone())
            .collect::<Vec<_>>();
        let key = key_cells.iter().map(KeyPart::from).collect::<Vec<_>>();
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push((key_cells, vec![StatSum::default(); stats.len()]));
            groups.len() - 1
        });
        let sums = &mut groups[slot].1;
        for (sum, column) in sums.iter_mut().zip(&stats) {
            sum.add(&row[column.index]);
        }
    }

    let columns = group
        .iter()
        .chain(stats.iter())
        .map(|c| c.name.clone())
        .collect::<Vec<_>>();
    let mut out = Table::new(columns)?;
    for (key_cells, sums) in groups {
        let mut row = key_cells;
        row.extend(sums.into_iter().map(StatSum::into_cell));
        out.push_row(row)?;
    }
    tag.apply(&mut out);
    Ok(out)
}

/// `GAMES` counts distinct game ids when the snapshot has them, since each
/// game contributes one row per team; otherwise it falls back to the row
/// count.
pub fn build_league_kpis(games: &Table, kpi_metrics: &[&str], tag: &SnapshotTag) -> Result<Table> {
    let mut columns = kpi_metrics
        .iter()
        .map(|m| format!("TOTAL_{m}"))
        .collect::<Vec<_>>();
    columns.push("GAMES".to_string());
    columns.push("GAMES_ROWS".to_string());

    let bound = bind_columns(games, kpi_metrics);
    let mut row = kpi_metrics
        .iter()
        .map(|metric| {
            bound
                .iter()
                .find(|c| c.name == *metric)
                .map(|c| Cell::Float(column_total(games, c.index)))
                .unwrap_or(Cell::Null)
        })
        .collect::<Vec<_>>();

    let rows = games.len() as i64;
    let game_count = games
        .column_index(GAME_ID_COLUMN)
        .map(|idx| distinct_count(games, idx) as i64)
        .unwrap_or(rows);
    row.push(Cell::Int(game_count));
    row.push(Cell::Int(rows));

    let mut out = Table::new(columns)?;
    out.push_row(row)?;
    tag.apply(&mut out);
    Ok(out)
}

pub fn league_kpis_schema(kpi_metrics: &[&str]) -> Vec<(String, ColumnKind)> {
    let mut schema = kpi_metrics
        .iter()
        .map(|m| (format!("TOTAL_{m}"), ColumnKind::Double))
        .collect::<Vec<_>>();
    schema.push(("GAMES".to_string(), ColumnKind::Int));
    schema.push(("GAMES_ROWS".to_string(), ColumnKind::Int));
    schema.push((ASOF_TAG.to_string(), ColumnKind::Text));
    schema.push((SEASON_TAG.to_string(), ColumnKind::Text));
    schema
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricTotal {
    pub metric: &'static str,
    pub total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeagueSeasonRow {
    pub season: Season,
    pub asof: NaiveDate,
    pub games: Option<u64>,
    pub totals: Vec<MetricTotal>,
}

impl LeagueSeasonRow {
    pub fn total(&self, metric: &str) -> Option<f64> {
        self.totals
            .iter()
            .find(|t| t.metric.eq_ignore_ascii_case(metric))
            .and_then(|t| t.total)
    }

    /// `total / games`, or `None` when either side is missing or no games
    /// were counted.
    pub fn per_game(&self, metric: &str) -> Option<f64> {
        let games = self.games.filter(|g| *g > 0)?;
        Some(self.total(metric)? / games as f64)
    }
}

pub fn build_league_season_row(games: &Table, season: Season, asof: NaiveDate) -> LeagueSeasonRow {
    let folded = ColumnsFolded::new(games);

    let game_count = folded
        .index(GAME_ID_COLUMN)
        .map(|idx| distinct_count(games, idx));

    let totals = HISTORY_METRICS
        .iter()
        .map(|&metric| MetricTotal {
            metric,
            total: folded.index(metric).map(|idx| column_total(games, idx)),
        })
        .collect();

    LeagueSeasonRow {
        season,
        asof,
        games: game_count,
        totals,
    }
}

pub fn league_history_schema() -> Vec<(String, ColumnKind)> {
    let mut schema = vec![
        ("season".to_string(), ColumnKind::Text),
        ("asof".to_string(), ColumnKind::Text),
        ("games".to_string(), ColumnKind::Int),
    ];
    schema.extend(HISTORY_METRICS.iter().map(|m| {
        (
            format!("total_{}", m.to_ascii_lowercase()),
            ColumnKind::Double,
        )
    }));
    schema.extend(HISTORY_METRICS.iter().map(|m| {
        (
            format!("{}_per_game", m.to_ascii_lowercase()),
            ColumnKind::Double,
        )
    }));
    schema
}

pub fn league_history_table(rows: &[LeagueSeasonRow]) -> Result<Table> {
    let columns = league_history_schema()
        .into_iter()
        .map(|(name, _)| name)
        .collect::<Vec<_>>();
    let mut out = Table::new(columns)?;
    for row in rows {
        let mut cells = vec![
            Cell::Text(row.season.to_string()),
            Cell::Text(format_asof(row.asof)),
            row.games.map(|g| Cell::Int(g as i64)).unwrap_or(Cell::Null),
        ];
        cells.extend(HISTORY_METRICS.iter().map(|m| Cell::from(row.total(m))));
        cells.extend(HISTORY_METRICS.iter().map(|m| Cell::from(row.per_game(m))));
        out.push_row(cells)?;
    }
    Ok(out)
}

pub fn build_standings_gold(standings: &Table, tag: &SnapshotTag) -> Table {
    let mut out = standings.clone();
    tag.apply(&mut out);
    out
}
