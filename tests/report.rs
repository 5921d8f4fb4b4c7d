use chrono::NaiveDate;

use nba_gold::blob_store::MemoryStore;
use nba_gold::gold_export::export_gold_workbook;
use nba_gold::report::{
    GoldView, ReportOptions, history_metrics_with_data, render_report, sort_standings_for_display,
    top_teams,
};
use nba_gold::season::Season;
use nba_gold::snapshot_store::{
    ENDPOINT_GAME_LOG, ENDPOINT_STANDINGS, GoldTable, SnapshotStore,
};
use nba_gold::stages::build_gold;
use nba_gold::table::{Cell, Table};

fn team_totals() -> Table {
    Table::from_rows(
        ["TEAM_ID", "TEAM_ABBREVIATION", "PTS"],
        vec![
            vec![Cell::Int(1), "BOS".into(), Cell::Int(9100)],
            vec![Cell::Int(2), "OKC".into(), Cell::Int(9800)],
            vec![Cell::Int(3), "CHA".into(), Cell::Int(8400)],
            vec![Cell::Int(4), "UTA".into(), "n/a".into()],
        ],
    )
    .unwrap()
}

#[test]
fn report_on_empty_store_degrades_to_no_data() {
    let store = SnapshotStore::new(MemoryStore::new());
    let view = GoldView::load(&store, None).unwrap();
    assert!(view.season.is_none());

    let text = render_report(&view, &ReportOptions::default());
    assert!(text.contains("No season with gold output"));
    assert_eq!(text.matches("no data").count(), 4);
}

#[test]
fn report_renders_every_section() {
    let store = SnapshotStore::new(MemoryStore::new());
    let season = Season::from_start_year(2024);
    let asof = NaiveDate::from_ymd_opt(2025, 2, 10).unwrap();
    let games = Table::from_rows(
        ["GAME_ID", "TEAM_NAME", "PTS", "AST"],
        vec![
            vec!["1".into(), "Boston Celtics".into(), Cell::Int(1100), Cell::Int(20)],
            vec!["1".into(), "Miami Heat".into(), Cell::Int(1050), Cell::Int(25)],
        ],
    )
    .unwrap();
    let standings = Table::from_rows(
        ["TeamName", "Conference", "PlayoffRank"],
        vec![
            vec!["Heat".into(), "East".into(), Cell::Int(2)],
            vec!["Thunder".into(), "West".into(), Cell::Int(1)],
            vec!["Celtics".into(), "East".into(), Cell::Int(1)],
        ],
    )
    .unwrap();
    store.write_raw(&season, ENDPOINT_GAME_LOG, asof, &games).unwrap();
    store.write_raw(&season, ENDPOINT_STANDINGS, asof, &standings).unwrap();
    build_gold(&store, &season, asof).unwrap();

    let view = GoldView::load(&store, None).unwrap();
    assert_eq!(view.season, Some(season));
    assert!(view.history.is_none());

    let text = render_report(&view, &ReportOptions::default());
    assert!(text.contains("Season 2024-25"));
    assert!(text.contains("2,150"));
    assert!(text.contains("Boston Celtics"));
    let (_, standings_text) = text.split_once("Standings\n").unwrap();
    let position = |name: &str| standings_text.find(name).unwrap();
    assert!(position("Celtics") < position("Heat"));
    assert!(position("Heat") < position("Thunder"));
    // History was never built.
    assert_eq!(text.matches("no data").count(), 1);
}

#[test]
fn top_teams_rank_by_metric() {
    let ranked = top_teams(&team_totals(), "PTS", 2).unwrap();
    assert_eq!(
        ranked,
        vec![("OKC".to_string(), 9800.0), ("BOS".to_string(), 9100.0)]
    );
    assert_eq!(top_teams(&team_totals(), "PTS", 10).unwrap().len(), 3);
    assert!(top_teams(&team_totals(), "BLK", 5).is_none());
}

#[test]
fn standings_sort_by_conference_then_rank() {
    let standings = Table::from_rows(
        ["TeamName", "Conference", "PlayoffRank", "WinPCT"],
        vec![
            vec!["Rockets".into(), "West".into(), Cell::Int(2), Cell::Float(0.63)],
            vec!["Celtics".into(), "East".into(), Cell::Int(2), Cell::Float(0.74)],
            vec!["Thunder".into(), "West".into(), Cell::Int(1), Cell::Float(0.83)],
            vec!["Cavaliers".into(), "East".into(), Cell::Int(1), Cell::Float(0.78)],
        ],
    )
    .unwrap();
    let sorted = sort_standings_for_display(&standings);
    let names = (0..sorted.len())
        .filter_map(|r| sorted.cell(r, "TeamName").map(Cell::render))
        .collect::<Vec<_>>();
    assert_eq!(names, ["Cavaliers", "Celtics", "Thunder", "Rockets"]);
}

#[test]
fn history_metrics_skip_all_zero_or_null_columns() {
    let history = Table::from_rows(
        ["season", "pts_per_game", "ast_per_game", "fg3m_per_game"],
        vec![
            vec!["2022-23".into(), Cell::Float(230.1), Cell::Null, Cell::Float(0.0)],
            vec!["2023-24".into(), Cell::Float(229.4), Cell::Null, Cell::Float(0.0)],
        ],
    )
    .unwrap();
    assert_eq!(history_metrics_with_data(&history), ["pts_per_game"]);
}

#[test]
fn export_writes_a_sheet_per_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gold.xlsx");
    let view = GoldView {
        season: Some(Season::from_start_year(2024)),
        team_totals: Some(team_totals()),
        ..GoldView::default()
    };

    let report = export_gold_workbook(&path, &view).unwrap();
    assert!(path.is_file());
    let sheets = report
        .sheets
        .iter()
        .map(|s| (s.name, s.rows))
        .collect::<Vec<_>>();
    assert_eq!(
        sheets,
        vec![
            ("KPIs", None),
            ("TeamTotals", Some(4)),
            ("Standings", None),
            ("LeagueHistory", None),
        ]
    );
    assert_eq!(report.season.as_deref(), Some("2024-25"));
}

#[test]
fn gold_keys_are_not_required_for_a_view() {
    let store = SnapshotStore::new(MemoryStore::new());
    let season = Season::from_start_year(2020);
    store
        .write_gold(&season, GoldTable::TeamTotals, &team_totals())
        .unwrap();
    let view = GoldView::load(&store, Some(season)).unwrap();
    assert!(view.kpis.is_none());
    assert_eq!(view.team_totals.map(|t| t.len()), Some(4));
}
