use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::config::PipelineConfig;
use crate::http_client::build_client;
use crate::season::Season;
use crate::snapshot_store::{ENDPOINT_GAME_LOG, ENDPOINT_STANDINGS};
use crate::table::{Cell, Table};

pub const DEFAULT_STATS_BASE_URL: &str = "https://stats.nba.com/stats";

const LEAGUE_ID: &str = "00";
const SEASON_TYPE: &str = "Regular Season";

// The stats API refuses requests that do not look like they come from the
// league website.
pub fn default_stats_headers() -> Vec<(String, String)> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
        ("Accept", "application/json, text/plain, */*"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Origin", "https://www.nba.com"),
        ("Referer", "https://www.nba.com/"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub trait StatsSource {
    fn fetch_game_log(&self, season: &Season) -> Result<Table>;

    fn fetch_standings(&self, season: &Season) -> Result<Table>;
}

pub struct NbaStatsClient {
    client: Client,
    base_url: String,
}

impl NbaStatsClient {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client =
            build_client(&config.http, &config.stats_headers).context("build stats client")?;
        Ok(Self {
            client,
            base_url: config.stats_base_url.clone(),
        })
    }

    fn fetch_result_set(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Table> {
        let url = format!("{}/{endpoint}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .with_context(|| format!("request {endpoint}"))?;
        let status = resp.status();
        let body = resp
            .text()
            .with_context(|| format!("read {endpoint} body"))?;
        if !status.is_success() {
            return Err(anyhow!("{endpoint} http {status}: {}", truncate(&body, 200)));
        }
        let table = parse_result_set_json(&body).with_context(|| format!("parse {endpoint}"))?;
        info!(
            endpoint,
            rows = table.len(),
            cols = table.columns().len(),
            "stats fetched"
        );
        Ok(table)
    }
}

impl StatsSource for NbaStatsClient {
    fn fetch_game_log(&self, season: &Season) -> Result<Table> {
        let params = [
            ("Counter", "1000".to_string()),
            ("DateFrom", String::new()),
            ("DateTo", String::new()),
            ("Direction", "DESC".to_string()),
            ("LeagueID", LEAGUE_ID.to_string()),
            ("PlayerOrTeam", "T".to_string()),
            ("Season", season.to_string()),
            ("SeasonType", SEASON_TYPE.to_string()),
            ("Sorter", "DATE".to_string()),
        ];
        self.fetch_result_set(ENDPOINT_GAME_LOG, &params)
    }

    fn fetch_standings(&self, season: &Season) -> Result<Table> {
        let params = [
            ("LeagueID", LEAGUE_ID.to_string()),
            ("Season", season.to_string()),
            ("SeasonType", SEASON_TYPE.to_string()),
            ("SeasonYear", String::new()),
        ];
        self.fetch_result_set(ENDPOINT_STANDINGS, &params)
    }
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "resultSets", default)]
    result_sets: Vec<ResultSet>,
    #[serde(rename = "resultSet")]
    result_set: Option<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    name: String,
    headers: Vec<String>,
    #[serde(rename = "rowSet", default)]
    row_set: Vec<Vec<Value>>,
}

pub fn parse_result_set_json(raw: &str) -> Result<Table> {
    let resp: StatsResponse =
        serde_json::from_str(raw.trim()).context("invalid stats json")?;
    let set = resp
        .result_sets
        .into_iter()
        .next()
        .or(resp.result_set)
        .ok_or_else(|| anyhow!("response has no result sets"))?;

    let width = set.headers.len();
    let mut table = Table::new(set.headers)
        .with_context(|| format!("result set {:?} headers", set.name))?;
    for values in set.row_set {
        let mut row = values.iter().map(json_to_cell).collect::<Vec<_>>();
        row.resize(width, Cell::Null);
        table.push_row(row)?;
    }
    Ok(table)
}

fn json_to_cell(v: &Value) -> Cell {
    match v {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(Cell::Int)
            .or_else(|| n.as_f64().map(Cell::Float))
            .unwrap_or(Cell::Null),
        Value::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("ãbc", 1), "ã");
        assert_eq!(truncate("ab", 5), "ab");
    }
}
