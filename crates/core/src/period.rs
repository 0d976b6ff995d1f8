use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Australian financial year (1 July to 30 June), named by its ending
/// calendar year: `FinancialYear(2025)` runs 2024-07-01 to 2025-06-30.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FinancialYear(pub u16);

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY{}", self.label())
    }
}

impl FinancialYear {
    pub fn new(ending_year: u16) -> Self {
        FinancialYear(ending_year)
    }

    pub fn ending_year(self) -> u16 {
        self.0
    }

    /// ATO-style label: `FinancialYear(2025)` is "2024-25".
    pub fn label(self) -> String {
        format!("{}-{:02}", self.0 - 1, self.0 % 100)
    }

    pub fn start_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0 as i32 - 1, 7, 1).unwrap()
    }

    pub fn end_date(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.0 as i32, 6, 30).unwrap()
    }

    pub fn range(self) -> DateRange {
        DateRange::new(self.start_date(), self.end_date())
    }

    /// The financial year a given date falls in.
    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= 7 {
            FinancialYear(date.year() as u16 + 1)
        } else {
            FinancialYear(date.year() as u16)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
