//! Reporting periods — fiscal years and quarters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reporting period: a full fiscal year or a single quarter.
///
/// Annual data is what the score engine consumes by default (the fourth
/// quarter of a filing stands for the full year at the providers we use),
/// but quarterly markers are kept so the fundamentals table can carry
/// interim rows without inventing fake years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    Annual(i32),
    Quarter(i32, u8),
}

impl Period {
    /// The comparable prior period: previous fiscal year, or same quarter of
    /// the previous year. Year-over-year comparison avoids seasonality in
    /// quarterly fundamentals.
    pub fn prior(&self) -> Period {
        match *self {
            Period::Annual(y) => Period::Annual(y - 1),
            Period::Quarter(y, q) => Period::Quarter(y - 1, q),
        }
    }

    pub fn year(&self) -> i32 {
        match *self {
            Period::Annual(y) | Period::Quarter(y, _) => y,
        }
    }

    /// Period end date in `YYYYMMDD` form, as the Tushare API expects.
    pub fn end_date(&self) -> String {
        match *self {
            Period::Annual(y) => format!("{y}1231"),
            Period::Quarter(y, 1) => format!("{y}0331"),
            Period::Quarter(y, 2) => format!("{y}0630"),
            Period::Quarter(y, 3) => format!("{y}0930"),
            Period::Quarter(y, _) => format!("{y}1231"),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Period::Annual(y) => write!(f, "{y}"),
            Period::Quarter(y, q) => write!(f, "{y}Q{q}"),
        }
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    /// Inverse of `Display`: `2024` or `2024Q3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("malformed period '{s}'");
        match s.split_once(['Q', 'q']) {
            None => s.parse::<i32>().map(Period::Annual).map_err(|_| bad()),
            Some((year, quarter)) => {
                let y = year.parse::<i32>().map_err(|_| bad())?;
                let q = quarter.parse::<u8>().map_err(|_| bad())?;
                if !(1..=4).contains(&q) {
                    return Err(bad());
                }
                Ok(Period::Quarter(y, q))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_of_annual() {
        assert_eq!(Period::Annual(2024).prior(), Period::Annual(2023));
    }

    #[test]
    fn prior_of_quarter_is_year_over_year() {
        assert_eq!(Period::Quarter(2024, 1).prior(), Period::Quarter(2023, 1));
    }

    #[test]
    fn end_dates() {
        assert_eq!(Period::Annual(2024).end_date(), "20241231");
        assert_eq!(Period::Quarter(2024, 3).end_date(), "20240930");
    }

    #[test]
    fn display() {
        assert_eq!(Period::Annual(2024).to_string(), "2024");
        assert_eq!(Period::Quarter(2024, 2).to_string(), "2024Q2");
    }

    #[test]
    fn from_str_roundtrip() {
        for period in [Period::Annual(2024), Period::Quarter(2023, 4)] {
            assert_eq!(period.to_string().parse::<Period>(), Ok(period));
        }
        assert!("2024Q5".parse::<Period>().is_err());
        assert!("junk".parse::<Period>().is_err());
    }
}
