use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::report::ReportId;
use crate::domain::{CustomerId, ObjectId, ProjectId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Open,
    InProgress,
    Completed,
    Closed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Closed => "Closed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Open" => Some(Self::Open),
            "In Progress" => Some(Self::InProgress),
            "Completed" => Some(Self::Completed),
            "Closed" => Some(Self::Closed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// A request past this point no longer accrues SLA obligations.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Completed | Self::Closed)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Emergency,
    Routine,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "Emergency",
            Self::Routine => "Routine",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Emergency" => Some(Self::Emergency),
            "Routine" => Some(Self::Routine),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "High" => Some(Self::High),
            "Medium" => Some(Self::Medium),
            "Low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    pub title: String,
    pub customer_id: CustomerId,
    pub project_id: ProjectId,
    pub object_id: ObjectId,
    pub assigned_engineer_id: Option<UserId>,
    pub status: RequestStatus,
    pub kind: RequestKind,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub sla_deadline: DateTime<Utc>,
    pub linked_report_id: Option<ReportId>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::{Priority, RequestKind, RequestStatus};

    #[test]
    fn status_labels_round_trip() {
        for status in [
            RequestStatus::Open,
            RequestStatus::InProgress,
            RequestStatus::Completed,
            RequestStatus::Closed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("Reopened"), None);
    }

    #[test]
    fn resolved_statuses_cover_completed_and_closed_only() {
        assert!(RequestStatus::Completed.is_resolved());
        assert!(RequestStatus::Closed.is_resolved());
        assert!(!RequestStatus::Open.is_resolved());
        assert!(!RequestStatus::InProgress.is_resolved());
        assert!(!RequestStatus::Cancelled.is_resolved());
    }

    #[test]
    fn kind_and_priority_labels_round_trip() {
        assert_eq!(RequestKind::parse("Emergency"), Some(RequestKind::Emergency));
        assert_eq!(Priority::parse(" Medium "), Some(Priority::Medium));
        assert_eq!(Priority::parse("Urgent"), None);
    }
}
