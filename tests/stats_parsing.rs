use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use nba_gold::aggregate::{
    KPI_METRICS, SnapshotTag, TEAM_GROUP_COLUMNS, TEAM_STAT_COLUMNS, build_league_kpis,
    build_team_totals,
};
use nba_gold::season::Season;
use nba_gold::stats_api::parse_result_set_json;
use nba_gold::table::{Cell, Table};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_game_log_fixture() {
    let raw = read_fixture("leaguegamelog.json");
    let table = parse_result_set_json(&raw).expect("fixture should parse");

    assert_eq!(table.columns().len(), 29);
    assert_eq!(table.len(), 4);
    assert_eq!(table.cell(0, "TEAM_ABBREVIATION"), Some(&Cell::from("BOS")));
    assert_eq!(table.cell(0, "TEAM_ID"), Some(&Cell::Int(1610612738)));
    assert_eq!(table.cell(0, "PTS"), Some(&Cell::Int(132)));
    assert_eq!(table.cell(0, "FG_PCT"), Some(&Cell::Float(0.505)));
    assert_eq!(table.cell(1, "PLUS_MINUS"), Some(&Cell::Int(-23)));
    assert_eq!(table.cell(3, "FG3_PCT"), Some(&Cell::Null));
    // Short rows are padded to the header width.
    assert_eq!(table.cell(3, "PLUS_MINUS"), Some(&Cell::Null));
    assert_eq!(table.cell(3, "VIDEO_AVAILABLE"), Some(&Cell::Null));
}

#[test]
fn game_log_fixture_aggregates() {
    let table = parse_result_set_json(&read_fixture("leaguegamelog.json")).unwrap();
    let tag = SnapshotTag::new(
        Season::from_start_year(2024),
        NaiveDate::from_ymd_opt(2024, 10, 23).unwrap(),
    );

    let totals = build_team_totals(&table, &TEAM_STAT_COLUMNS, &TEAM_GROUP_COLUMNS, &tag).unwrap();
    assert_eq!(totals.len(), 4);
    assert_eq!(&totals.columns()[..3], ["TEAM_ID", "TEAM_ABBREVIATION", "TEAM_NAME"]);
    assert_eq!(totals.columns().len(), 3 + TEAM_STAT_COLUMNS.len() + 2);

    let kpis = build_league_kpis(&table, &KPI_METRICS, &tag).unwrap();
    assert_eq!(kpis.cell(0, "TOTAL_PTS"), Some(&Cell::Float(454.0)));
    assert_eq!(kpis.cell(0, "GAMES"), Some(&Cell::Int(2)));
    assert_eq!(kpis.cell(0, "GAMES_ROWS"), Some(&Cell::Int(4)));
}

fn without_column(table: &Table, dropped: &str) -> Table {
    let keep = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| name.as_str() != dropped)
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    let columns = keep.iter().map(|&idx| table.columns()[idx].clone());
    let rows = table
        .rows()
        .iter()
        .map(|row| keep.iter().map(|&idx| row[idx].clone()).collect())
        .collect();
    Table::from_rows(columns, rows).unwrap()
}

#[test]
fn dropping_one_stat_column_leaves_other_fields_unchanged() {
    let full = parse_result_set_json(&read_fixture("leaguegamelog.json")).unwrap();
    let reduced = without_column(&full, "AST");
    assert_eq!(reduced.columns().len(), full.columns().len() - 1);
    let tag = SnapshotTag::new(
        Season::from_start_year(2024),
        NaiveDate::from_ymd_opt(2024, 10, 23).unwrap(),
    );

    let full_totals =
        build_team_totals(&full, &TEAM_STAT_COLUMNS, &TEAM_GROUP_COLUMNS, &tag).unwrap();
    let reduced_totals =
        build_team_totals(&reduced, &TEAM_STAT_COLUMNS, &TEAM_GROUP_COLUMNS, &tag).unwrap();
    assert!(!reduced_totals.has_column("AST"));
    assert_eq!(without_column(&full_totals, "AST"), reduced_totals);

    let full_kpis = build_league_kpis(&full, &KPI_METRICS, &tag).unwrap();
    let reduced_kpis = build_league_kpis(&reduced, &KPI_METRICS, &tag).unwrap();
    assert_eq!(full_kpis.columns(), reduced_kpis.columns());
    assert_eq!(full_kpis.cell(0, "TOTAL_AST"), Some(&Cell::Float(105.0)));
    assert_eq!(reduced_kpis.cell(0, "TOTAL_AST"), Some(&Cell::Null));
    for column in full_kpis.columns().iter().filter(|c| c.as_str() != "TOTAL_AST") {
        assert_eq!(full_kpis.cell(0, column), reduced_kpis.cell(0, column), "{column}");
    }
}

#[test]
fn parses_standings_fixture() {
    let table = parse_result_set_json(&read_fixture("leaguestandingsv3.json")).unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(table.cell(0, "TeamName"), Some(&Cell::from("Thunder")));
    assert_eq!(table.cell(1, "Conference"), Some(&Cell::from("East")));
    assert_eq!(table.cell(2, "WinPCT"), Some(&Cell::Float(0.744)));
    assert_eq!(table.cell(0, "ClinchedPlayoffBirth"), Some(&Cell::Bool(true)));
    assert_eq!(table.cell(3, "ClinchedPlayoffBirth"), Some(&Cell::Null));
}

#[test]
fn accepts_single_result_set_shape() {
    let table = parse_result_set_json(&read_fixture("single_result_set.json")).unwrap();
    assert_eq!(table.columns(), ["TeamID", "TeamName", "WinPCT", "Streak"]);
    let streak = table.cell(0, "Streak").and_then(Cell::as_str).unwrap();
    assert!(streak.contains("\"kind\""));
}

#[test]
fn rejects_responses_without_result_sets() {
    assert!(parse_result_set_json(r#"{"resultSets": []}"#).is_err());
    assert!(parse_result_set_json("<html>Access Denied</html>").is_err());
}
