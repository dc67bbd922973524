//! Calendar periods and the grain (month, quarter, year) used to bucket them

use crate::error::ReservingError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month. Finer detail (day of month) is dropped on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    /// 1-based month
    month: u32,
}

impl Period {
    /// Create a period; `month` is 1-based and must be in 1..=12
    pub fn new(year: i32, month: u32) -> Result<Self, ReservingError> {
        if !(1..=12).contains(&month) {
            return Err(ReservingError::InvalidPeriod(format!("{}-{:02}", year, month)));
        }
        Ok(Self { year, month })
    }

    /// January of the given year
    pub fn year_start(year: i32) -> Self {
        Self { year, month: 1 }
    }

    /// December of the given year
    pub fn year_end(year: i32) -> Self {
        Self { year, month: 12 }
    }

    /// Parse a valuation cutoff. A bare `YYYY` means the whole year (`YYYY-12`);
    /// anything finer is taken as the month it names.
    pub fn parse_cutoff(s: &str) -> Result<Self, ReservingError> {
        let trimmed = s.trim();
        if is_bare_year(trimmed) {
            let year: i32 = trimmed
                .parse()
                .map_err(|_| ReservingError::InvalidPeriod(s.to_string()))?;
            return Ok(Self::year_end(year));
        }
        trimmed.parse()
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Months since year 0, used for lag arithmetic
    pub fn month_index(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    pub fn from_month_index(index: i64) -> Self {
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn add_months(&self, months: i64) -> Self {
        Self::from_month_index(self.month_index() + months)
    }

    /// Round down to the first month of the grain bucket containing this period
    pub fn start_of(&self, grain: Grain) -> Self {
        match grain {
            Grain::Month => *self,
            Grain::Quarter => Self {
                year: self.year,
                month: (self.month - 1) / 3 * 3 + 1,
            },
            Grain::Year => Self::year_start(self.year),
        }
    }

    /// Label of the grain bucket containing this period, e.g. `2019`, `2019Q3`, `2019-07`
    pub fn label(&self, grain: Grain) -> String {
        match grain {
            Grain::Month => self.to_string(),
            Grain::Quarter => format!("{}Q{}", self.year, (self.month - 1) / 3 + 1),
            Grain::Year => self.year.to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = ReservingError;

    /// Accepts `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and `YYYY-MM-DD hh:mm:ss`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ReservingError::InvalidPeriod(s.to_string());

        // Timestamps exported by databases carry a time part we don't need
        let date_part = trimmed
            .split(|c: char| c == ' ' || c == 'T')
            .next()
            .unwrap_or(trimmed);

        if is_bare_year(date_part) {
            let year: i32 = date_part.parse().map_err(|_| invalid())?;
            return Ok(Self::year_start(year));
        }

        let full = match date_part.matches('-').count() {
            1 => format!("{}-01", date_part),
            2 => date_part.to_string(),
            _ => return Err(invalid()),
        };

        NaiveDate::parse_from_str(&full, "%Y-%m-%d")
            .map(Self::from_date)
            .map_err(|_| invalid())
    }
}

fn is_bare_year(s: &str) -> bool {
    s.len() == 4 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Serde helper for cutoff fields, see [`Period::parse_cutoff`]
pub fn deserialize_cutoff<'de, D>(deserializer: D) -> Result<Period, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Period::parse_cutoff(&raw).map_err(serde::de::Error::custom)
}

impl TryFrom<String> for Period {
    type Error = ReservingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// Period unit used for both the origin and development axes of a triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grain {
    Month,
    Quarter,
    Year,
}

impl Grain {
    /// Number of calendar months in one grain unit
    pub fn months(&self) -> i64 {
        match self {
            Grain::Month => 1,
            Grain::Quarter => 3,
            Grain::Year => 12,
        }
    }

    /// Grain units between the buckets of `origin` and `event` (negative if event is earlier)
    pub fn lag(&self, origin: Period, event: Period) -> i64 {
        let diff = event.start_of(*self).month_index() - origin.start_of(*self).month_index();
        diff / self.months()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grain::Month => "month",
            Grain::Quarter => "quarter",
            Grain::Year => "year",
        }
    }
}

impl Default for Grain {
    fn default() -> Self {
        Grain::Year
    }
}

impl fmt::Display for Grain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "month" | "monthly" => Ok(Grain::Month),
            "q" | "quarter" | "quarterly" => Ok(Grain::Quarter),
            "y" | "year" | "yearly" | "annual" => Ok(Grain::Year),
            other => Err(format!("Unknown grain: {}", other)),
        }
    }
}
