use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{CustomerId, ProjectId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Sent => "Sent",
            Self::Paid => "Paid",
            Self::Overdue => "Overdue",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Draft" => Some(Self::Draft),
            "Sent" => Some(Self::Sent),
            "Paid" => Some(Self::Paid),
            "Overdue" => Some(Self::Overdue),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterpartyType {
    Customer,
    Subcontractor,
}

impl CounterpartyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "Customer",
            Self::Subcontractor => "Subcontractor",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Customer" => Some(Self::Customer),
            "Subcontractor" => Some(Self::Subcontractor),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub project_id: ProjectId,
    pub counterparty_type: CounterpartyType,
    pub counterparty_name: String,
    pub customer_id: Option<CustomerId>,
    pub amount: Decimal,
    pub status: InvoiceStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}
