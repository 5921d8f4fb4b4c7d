use std::cmp::Ordering;
use std::fmt::Write as _;

use anyhow::Result;
use tracing::{info, warn};

use crate::aggregate::{HISTORY_METRICS, KPI_METRICS};
use crate::blob_store::BlobStore;
use crate::season::Season;
use crate::snapshot_store::{GoldTable, SnapshotStore, gold_key, history_key};
use crate::table::{Cell, Table};

pub const DEFAULT_TOP_METRIC: &str = "PTS";
pub const DEFAULT_TOP_N: usize = 15;

const NULL_MARK: &str = "—";
const TEAM_LABEL_COLUMNS: [&str; 2] = ["TEAM_NAME", "TEAM_ABBREVIATION"];
const STANDINGS_DISPLAY_COLUMNS: [&str; 8] = [
    "TeamCity",
    "TeamName",
    "Conference",
    "PlayoffRank",
    "WINS",
    "LOSSES",
    "WinPCT",
    "Record",
];

#[derive(Debug, Clone, Default)]
pub struct GoldView {
    pub season: Option<Season>,
    pub kpis: Option<Table>,
    pub team_totals: Option<Table>,
    pub standings: Option<Table>,
    pub history: Option<Table>,
}

impl GoldView {
    /// Loads the view for `season`, or for the newest season with gold
    /// output when none is given. Listing failures still propagate.
    pub fn load<B: BlobStore>(store: &SnapshotStore<B>, season: Option<Season>) -> Result<Self> {
        let season = match season {
            Some(season) => Some(season),
            None => store.discover_seasons()?.into_iter().next(),
        };

        let mut view = GoldView {
            season,
            history: load_tolerant(store, &history_key()),
            ..GoldView::default()
        };
        if let Some(season) = season {
            view.kpis = load_tolerant(store, &gold_key(&season, GoldTable::Kpis));
            view.team_totals = load_tolerant(store, &gold_key(&season, GoldTable::TeamTotals));
            view.standings = load_tolerant(store, &gold_key(&season, GoldTable::Standings));
        }
        info!(
            season = ?season.map(|s| s.to_string()),
            kpis = view.kpis.is_some(),
            team_totals = view.team_totals.is_some(),
            standings = view.standings.is_some(),
            history = view.history.is_some(),
            "gold view loaded"
        );
        Ok(view)
    }
}

fn load_tolerant<B: BlobStore>(store: &SnapshotStore<B>, key: &str) -> Option<Table> {
    match store.read_optional(key) {
        Ok(table) => table,
        Err(err) => {
            warn!(key, error = %err, "gold table unreadable");
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub metric: String,
    pub top: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            metric: DEFAULT_TOP_METRIC.to_string(),
            top: DEFAULT_TOP_N,
        }
    }
}

fn present(table: &Option<Table>) -> Option<&Table> {
    table.as_ref().filter(|t| !t.is_empty())
}

pub fn format_total(value: Option<f64>) -> String {
    let Some(value) = value else {
        return NULL_MARK.to_string();
    };
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::new();
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0 {
        out.insert(0, '-');
    }
    out
}

fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Null => NULL_MARK.to_string(),
        Cell::Float(v) => format!("{v:.3}"),
        other => other.render(),
    }
}

pub fn render_report(view: &GoldView, opts: &ReportOptions) -> String {
    let mut out = String::new();
    match view.season {
        Some(season) => {
            let _ = writeln!(out, "Season {season}");
        }
        None => {
            let _ = writeln!(out, "No season with gold output");
        }
    }
    out.push('\n');
    render_kpis(&mut out, view);
    out.push('\n');
    render_history(&mut out, view);
    out.push('\n');
    render_top_teams(&mut out, view, opts);
    out.push('\n');
    render_standings(&mut out, view);
    out
}

fn render_kpis(out: &mut String, view: &GoldView) {
    let _ = writeln!(out, "League KPIs");
    let Some(kpis) = present(&view.kpis) else {
        let _ = writeln!(out, "  no data");
        return;
    };
    for metric in KPI_METRICS {
        let value = kpis
            .cell(0, &format!("TOTAL_{metric}"))
            .and_then(Cell::as_f64);
        let _ = writeln!(out, "  {metric:<5} {:>12}", format_total(value));
    }
    if let Some(games) = kpis.cell(0, "GAMES").and_then(Cell::as_f64) {
        let _ = writeln!(out, "  {:<5} {:>12}", "GAMES", format_total(Some(games)));
    }
}

pub fn history_metrics_with_data(history: &Table) -> Vec<String> {
    HISTORY_METRICS
        .iter()
        .map(|m| format!("{}_per_game", m.to_ascii_lowercase()))
        .filter(|col| {
            history.column_index(col).is_some_and(|idx| {
                history
                    .column_cells(idx)
                    .filter_map(Cell::as_f64)
                    .any(|v| v != 0.0)
            })
        })
        .collect()
}

fn render_history(out: &mut String, view: &GoldView) {
    let _ = writeln!(out, "League history");
    let Some(history) = present(&view.history).filter(|t| t.has_column("season")) else {
        let _ = writeln!(out, "  no data");
        return;
    };
    let metrics = history_metrics_with_data(history);
    if metrics.is_empty() {
        let _ = writeln!(out, "  no per-game metrics with data");
        return;
    }

    let _ = write!(out, "  {:<9}", "season");
    for metric in &metrics {
        let _ = write!(out, " {metric:>15}");
    }
    out.push('\n');
    for row in 0..history.len() {
        let season = history
            .cell(row, "season")
            .map(Cell::render)
            .unwrap_or_default();
        let _ = write!(out, "  {season:<9}");
        for metric in &metrics {
            let value = history.cell(row, metric).and_then(Cell::as_f64);
            let text = value
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| NULL_MARK.to_string());
            let _ = write!(out, " {text:>15}");
        }
        out.push('\n');
    }
}

pub fn top_teams(team_totals: &Table, metric: &str, n: usize) -> Option<Vec<(String, f64)>> {
    let metric_idx = team_totals.column_index(metric)?;
    let label_idx = TEAM_LABEL_COLUMNS
        .iter()
        .find_map(|c| team_totals.column_index(c));

    let mut ranked = team_totals
        .rows()
        .iter()
        .enumerate()
        .filter_map(|(row_idx, row)| {
            let value = row[metric_idx].as_f64()?;
            let label = match label_idx {
                Some(idx) => row[idx].render(),
                None => format!("#{}", row_idx + 1),
            };
            Some((label, value))
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(n);
    Some(ranked)
}

fn render_top_teams(out: &mut String, view: &GoldView, opts: &ReportOptions) {
    let _ = writeln!(out, "Top {} teams by {}", opts.top, opts.metric);
    let Some(team_totals) = present(&view.team_totals) else {
        let _ = writeln!(out, "  no data");
        return;
    };
    match top_teams(team_totals, &opts.metric, opts.top) {
        Some(ranked) if !ranked.is_empty() => {
            for (rank, (label, value)) in ranked.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {:>2}. {label:<28} {:>10}",
                    rank + 1,
                    format_total(Some(*value))
                );
            }
        }
        Some(_) => {
            let _ = writeln!(out, "  no numeric values for {}", opts.metric);
        }
        None => {
            let _ = writeln!(
                out,
                "  column {} not in team totals ({})",
                opts.metric,
                team_totals.columns().join(", ")
            );
        }
    }
}

fn rank_key(cell: Option<&Cell>) -> f64 {
    cell.and_then(Cell::as_f64).unwrap_or(f64::INFINITY)
}

/// Orders standings by conference then playoff rank when both columns exist,
/// otherwise by win percentage descending. Other tables come back unchanged.
pub fn sort_standings_for_display(standings: &Table) -> Table {
    let mut sorted = standings.clone();
    let conference = standings.column_index("Conference");
    let playoff_rank = standings.column_index("PlayoffRank");
    let win_pct = standings.column_index("WinPCT");

    let mut order = (0..standings.len()).collect::<Vec<_>>();
    let rows = standings.rows();
    match (conference, playoff_rank, win_pct) {
        (Some(conf), Some(rank), _) => {
            order.sort_by(|&a, &b| {
                rows[a][conf]
                    .render()
                    .cmp(&rows[b][conf].render())
                    .then_with(|| {
                        rank_key(rows[a].get(rank))
                            .partial_cmp(&rank_key(rows[b].get(rank)))
                            .unwrap_or(Ordering::Equal)
                    })
            });
        }
        (_, _, Some(pct)) => {
            order.sort_by(|&a, &b| {
                let a = rows[a][pct].as_f64().unwrap_or(f64::NEG_INFINITY);
                let b = rows[b][pct].as_f64().unwrap_or(f64::NEG_INFINITY);
                b.partial_cmp(&a).unwrap_or(Ordering::Equal)
            });
        }
        _ => return sorted,
    }
    sorted.reorder_rows(&order);
    sorted
}

fn render_standings(out: &mut String, view: &GoldView) {
    let _ = writeln!(out, "Standings");
    let Some(standings) = present(&view.standings) else {
        let _ = writeln!(out, "  no data");
        return;
    };
    let sorted = sort_standings_for_display(standings);

    let mut columns = STANDINGS_DISPLAY_COLUMNS
        .iter()
        .filter_map(|c| sorted.column_index(c).map(|idx| (*c, idx)))
        .collect::<Vec<_>>();
    if columns.is_empty() {
        columns = sorted
            .columns()
            .iter()
            .take(6)
            .enumerate()
            .map(|(idx, c)| (c.as_str(), idx))
            .collect();
    }

    let _ = write!(out, " ");
    for (name, _) in &columns {
        let _ = write!(out, " {name:>12}");
    }
    out.push('\n');
    for row in sorted.rows() {
        let _ = write!(out, " ");
        for (_, idx) in &columns {
            let _ = write!(out, " {:>12}", format_cell(&row[*idx]));
        }
        out.push('\n');
    }
}
