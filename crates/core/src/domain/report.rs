use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::RequestId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Draft,
    Submitted,
    Approved,
    Archived,
    Cancelled,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Archived => "Archived",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Draft" => Some(Self::Draft),
            "Submitted" => Some(Self::Submitted),
            "Approved" => Some(Self::Approved),
            "Archived" => Some(Self::Archived),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub description: String,
    pub hours: Decimal,
    pub rate: Decimal,
    pub total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceReport {
    pub id: ReportId,
    pub service_request_id: RequestId,
    pub status: ReportStatus,
    pub work_items: Vec<WorkItem>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl ServiceReport {
    /// Invariant: `total_amount == Σ hours × rate`, re-derived on every save.
    pub fn recompute_totals(&mut self) {
        let mut total = Decimal::ZERO;
        for item in &mut self.work_items {
            item.total = item.hours * item.rate;
            total += item.total;
        }
        self.total_amount = total;
    }
}
