//! Database enum types for the company registry.
//!
//! `ApprovalStage` is stored as an `INTEGER` column and `ProcessingStatus` as a
//! `VARCHAR` column; both map to Rust enums so handlers never compare raw
//! integers or strings. `CompanyStatus` is derived and never stored.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::{Integer, Text};
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

// ============================================================================
// APPROVAL STAGE
// ============================================================================

/// Tri-state workflow flag on a company record
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Integer)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum ApprovalStage {
    Unapproved = 0,
    Approved = 1,
    Rejected = 2,
}

impl Default for ApprovalStage {
    fn default() -> Self {
        Self::Unapproved
    }
}

impl ApprovalStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unapproved => "Unapproved",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Stages that send a company back to the start of processing.
    pub fn resets_processing(&self) -> bool {
        matches!(self, Self::Unapproved | Self::Rejected)
    }
}

impl From<ApprovalStage> for i32 {
    fn from(stage: ApprovalStage) -> Self {
        stage as i32
    }
}

impl TryFrom<i32> for ApprovalStage {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unapproved),
            1 => Ok(Self::Approved),
            2 => Ok(Self::Rejected),
            _ => Err(format!("Unknown approval stage: {value} (expected 0, 1 or 2)")),
        }
    }
}

impl ToSql<Integer, Pg> for ApprovalStage {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let v = *self as i32;
        out.write_all(&v.to_be_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Integer, Pg> for ApprovalStage {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <i32 as FromSql<Integer, Pg>>::from_sql(bytes)?;
        Self::try_from(value).map_err(Into::into)
    }
}

impl std::fmt::Display for ApprovalStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// PROCESSING STATUS
// ============================================================================

/// Where a company sits in the external extraction pipeline
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
pub enum ProcessingStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Done")]
    Done,
}

impl Default for ProcessingStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::Processing => "Processing",
            Self::Done => "Done",
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "not started" | "notstarted" | "" => Ok(Self::NotStarted),
            "processing" => Ok(Self::Processing),
            "done" | "completed" | "complete" => Ok(Self::Done),
            other => Err(format!("Unknown processing status: {other}")),
        }
    }
}

impl ToSql<Text, Pg> for ProcessingStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for ProcessingStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        value.parse().map_err(Into::into)
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// COMPANY STATUS
// ============================================================================

/// Derived from the presence of a registration number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompanyStatus {
    Active,
    Inactive,
}

impl CompanyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Inactive => "Inactive",
        }
    }
}

impl std::fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_stage_round_trip() {
        for stage in [
            ApprovalStage::Unapproved,
            ApprovalStage::Approved,
            ApprovalStage::Rejected,
        ] {
            assert_eq!(ApprovalStage::try_from(i32::from(stage)), Ok(stage));
        }
        assert!(ApprovalStage::try_from(3).is_err());
        assert!(ApprovalStage::try_from(-1).is_err());
    }

    #[test]
    fn test_approval_stage_serializes_as_integer() {
        let json = serde_json::to_string(&ApprovalStage::Approved).unwrap();
        assert_eq!(json, "1");
        let parsed: ApprovalStage = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, ApprovalStage::Rejected);
        assert!(serde_json::from_str::<ApprovalStage>("7").is_err());
    }

    #[test]
    fn test_resets_processing() {
        assert!(ApprovalStage::Unapproved.resets_processing());
        assert!(ApprovalStage::Rejected.resets_processing());
        assert!(!ApprovalStage::Approved.resets_processing());
    }

    #[test]
    fn test_processing_status_parsing() {
        assert_eq!("Not Started".parse(), Ok(ProcessingStatus::NotStarted));
        assert_eq!("not_started".parse(), Ok(ProcessingStatus::NotStarted));
        assert_eq!("PROCESSING".parse(), Ok(ProcessingStatus::Processing));
        assert_eq!("done".parse(), Ok(ProcessingStatus::Done));
        assert!("queued".parse::<ProcessingStatus>().is_err());
    }

    #[test]
    fn test_processing_status_json_labels() {
        let json = serde_json::to_string(&ProcessingStatus::NotStarted).unwrap();
        assert_eq!(json, "\"Not Started\"");
    }
}
