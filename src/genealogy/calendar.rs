//! Seasonal calendar used for birth and death dates.
//!
//! A year has four seasons. Years may be negative for events before the
//! world's reckoning begins.

use std::fmt;
use serde::{Serialize, Deserialize};

/// The four seasons
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Spring = 0,
    Summer = 1,
    Autumn = 2,
    Winter = 3,
}

impl Season {
    pub fn name(&self) -> &'static str {
        match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        }
    }
}

/// A specific date in the world calendar (year + season).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub season: Season,
}

impl Date {
    pub fn new(year: i32, season: Season) -> Self {
        Self { year, season }
    }

    /// Spring of the given year.
    pub fn year(year: i32) -> Self {
        Self { year, season: Season::Spring }
    }

    /// Total number of seasons from year 0 spring.
    pub fn total_seasons(&self) -> i64 {
        self.year as i64 * 4 + self.season as i64
    }
}

impl Ord for Date {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.total_seasons().cmp(&other.total_seasons())
    }
}

impl PartialOrd for Date {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of Year {}", self.season.name(), self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_ordering() {
        let a = Date::new(1, Season::Spring);
        let b = Date::new(1, Season::Summer);
        let c = Date::new(-3, Season::Winter);
        assert!(a < b);
        assert!(c < a);
        assert!(c.total_seasons() < 0);
    }

    #[test]
    fn test_date_display() {
        assert_eq!(Date::new(12, Season::Autumn).to_string(), "Autumn of Year 12");
    }
}
