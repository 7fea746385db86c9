//! Dataset table selector.

use crate::error::FulfillmentError;
use std::str::FromStr;

/// The three tables of the JHU CSSE COVID-19 dataset this service reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsTable {
    ConfirmedCases,
    Deaths,
    RecoveredCases,
}

impl StatsTable {
    pub const ALL: [StatsTable; 3] = [
        StatsTable::ConfirmedCases,
        StatsTable::Deaths,
        StatsTable::RecoveredCases,
    ];

    /// Table name as it appears in the dataset.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmedCases => "confirmed_cases",
            Self::Deaths => "deaths",
            Self::RecoveredCases => "recovered_cases",
        }
    }
}

impl std::fmt::Display for StatsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StatsTable {
    type Err = FulfillmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed_cases" => Ok(Self::ConfirmedCases),
            "deaths" => Ok(Self::Deaths),
            "recovered_cases" => Ok(Self::RecoveredCases),
            other => Err(FulfillmentError::InvalidTable(other.to_string())),
        }
    }
}
