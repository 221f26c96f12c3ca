use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QcError;

/// Numeric identifier of a run report on the data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(u32);

impl ReportId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReportId {
    type Err = QcError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let id = trimmed
            .parse::<u32>()
            .map_err(|_| QcError::InvalidReportId(value.to_string()))?;
        if id == 0 {
            return Err(QcError::InvalidReportId(value.to_string()));
        }
        Ok(Self(id))
    }
}

/// Lifecycle state the data service reports for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Error,
    Other(String),
}

impl RunStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "Pending" => RunStatus::Pending,
            "Running" | "Started" => RunStatus::Running,
            "Completed" => RunStatus::Completed,
            "Error" => RunStatus::Error,
            other => RunStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "Pending"),
            RunStatus::Running => write!(f, "Running"),
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Error => write!(f, "Error"),
            RunStatus::Other(value) => write!(f, "{value}"),
        }
    }
}
