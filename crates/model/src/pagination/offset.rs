use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Watermark recorded when the table is empty at seed time. Every row,
/// including one whose polling column is `0`, sorts above it.
pub const EMPTY_TABLE_OFFSET: &str = "-1";

/// How the first watermark of a session is chosen when none was supplied.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeedStrategy {
    /// Scan the polling column without a filter and keep the last value seen.
    /// Only correct when the scan returns rows in ascending polling-column order.
    #[default]
    LastRow,

    /// Ask the database for `MAX(<polling column>)`.
    #[serde(alias = "max")]
    MaxAggregate,
}

impl fmt::Display for SeedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedStrategy::LastRow => write!(f, "last_row"),
            SeedStrategy::MaxAggregate => write!(f, "max_aggregate"),
        }
    }
}

impl FromStr for SeedStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "last_row" | "last-row" | "last" => Ok(SeedStrategy::LastRow),
            "max" | "max_aggregate" | "max-aggregate" => Ok(SeedStrategy::MaxAggregate),
            other => Err(format!("unknown seed strategy '{other}'")),
        }
    }
}
