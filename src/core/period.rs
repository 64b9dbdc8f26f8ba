use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Monthly settlement period `(year, month)`
///
/// All boundaries are UTC. A period covers `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("Invalid month {} (expected 1-12)", month));
        }
        if !(1970..=9999).contains(&year) {
            return Err(format!("Invalid year {}", year));
        }
        Ok(Self { year, month })
    }

    /// Period containing the given instant
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First instant of the period
    pub fn start(&self) -> DateTime<Utc> {
        Self::first_instant(self.year, self.month)
    }

    /// First instant after the period
    pub fn end(&self) -> DateTime<Utc> {
        let next = self.next();
        Self::first_instant(next.year, next.month)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start() && at < self.end()
    }

    fn first_instant(year: i32, month: u32) -> DateTime<Utc> {
        // year/month are range-checked on construction, so day 1 always exists
        let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
        Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid period '{}'. Expected YYYY-MM", s))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| format!("Invalid period year in '{}'", s))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("Invalid period month in '{}'", s))?;
        Period::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}
