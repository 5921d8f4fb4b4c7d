use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::Error;

const ASOF_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Season {
    start_year: i32,
}

impl Season {
    pub fn from_start_year(start_year: i32) -> Self {
        Self { start_year }
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Season in progress on `date`. A season starts in October.
    pub fn containing(date: NaiveDate) -> Self {
        let year = date.year();
        if date.month() >= 10 {
            Self::from_start_year(year)
        } else {
            Self::from_start_year(year - 1)
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = (self.start_year + 1).rem_euclid(100);
        write!(f, "{}-{:02}", self.start_year, end)
    }
}

impl FromStr for Season {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let invalid = || Error::InvalidSeason(raw.to_string());
        let (start, end) = trimmed.split_once('-').ok_or_else(invalid)?;
        if start.len() != 4 || end.len() != 2 {
            return Err(invalid());
        }
        if !start.bytes().chain(end.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let start_year = start.parse::<i32>().map_err(|_| invalid())?;
        let end_year = end.parse::<i32>().map_err(|_| invalid())?;
        if (start_year + 1).rem_euclid(100) != end_year {
            return Err(invalid());
        }
        Ok(Self::from_start_year(start_year))
    }
}

pub fn format_asof(date: NaiveDate) -> String {
    date.format(ASOF_FORMAT).to_string()
}

pub fn parse_asof(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), ASOF_FORMAT).ok()
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_two_digit_end_year() {
        assert_eq!(Season::from_start_year(2015).to_string(), "2015-16");
        assert_eq!(Season::from_start_year(1999).to_string(), "1999-00");
    }

    #[test]
    fn parses_and_rejects() {
        assert_eq!("2025-26".parse::<Season>().ok(), Some(Season::from_start_year(2025)));
        assert!("2025-27".parse::<Season>().is_err());
        assert!("2025".parse::<Season>().is_err());
        assert!("25-26".parse::<Season>().is_err());
    }

    #[test]
    fn season_containing_date_flips_in_october() {
        let sep = NaiveDate::from_ymd_opt(2025, 9, 30).unwrap();
        let oct = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        assert_eq!(Season::containing(sep).to_string(), "2024-25");
        assert_eq!(Season::containing(oct).to_string(), "2025-26");
    }
}
