use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::{Priority, RequestId, RequestKind, ServiceRequest};

/// Time source, injected so SLA evaluation is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Deadline table keyed by request kind and priority. Defaults reproduce
/// the contract terms; deployments override them in `[sla]` config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub emergency_high_hours: i64,
    pub emergency_medium_hours: i64,
    pub routine_high_days: i64,
    pub default_days: i64,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            emergency_high_hours: 4,
            emergency_medium_hours: 8,
            routine_high_days: 1,
            default_days: 3,
        }
    }
}

impl SlaPolicy {
    pub fn deadline(
        &self,
        kind: RequestKind,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match (kind, priority) {
            (RequestKind::Emergency, Priority::High) => {
                created_at + Duration::hours(self.emergency_high_hours)
            }
            (RequestKind::Emergency, Priority::Medium) => {
                created_at + Duration::hours(self.emergency_medium_hours)
            }
            (RequestKind::Routine, Priority::High) => {
                created_at + Duration::days(self.routine_high_days)
            }
            _ => created_at + Duration::days(self.default_days),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBreach {
    pub request_id: RequestId,
    pub title: String,
    pub priority: Priority,
    pub deadline: DateTime<Utc>,
    pub observed_at: DateTime<Utc>,
}

/// Breach check over an observed request. Compares calendar dates, not
/// instants: the deadline field has date-only resolution upstream, so a
/// request breaches on the day *after* its deadline date. Idempotent; the
/// same breach reports again on every evaluation.
pub fn check_breach(request: &ServiceRequest, now: DateTime<Utc>) -> Option<SlaBreach> {
    if request.status.is_resolved() {
        return None;
    }
    if now.date_naive() <= request.sla_deadline.date_naive() {
        return None;
    }
    Some(SlaBreach {
        request_id: request.id.clone(),
        title: request.title.clone(),
        priority: request.priority,
        deadline: request.sla_deadline,
        observed_at: now,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::domain::request::{
        Priority, RequestId, RequestKind, RequestStatus, ServiceRequest,
    };
    use crate::domain::{CustomerId, ObjectId, ProjectId};

    use super::{check_breach, Clock, FixedClock, SlaPolicy};

    fn request(status: RequestStatus, deadline_offset: Duration) -> ServiceRequest {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        ServiceRequest {
            id: RequestId("SR-001".to_string()),
            title: "lift motor failure".to_string(),
            customer_id: CustomerId("CUST-7".to_string()),
            project_id: ProjectId("PROJ-1".to_string()),
            object_id: ObjectId("OBJ-3".to_string()),
            assigned_engineer_id: None,
            status,
            kind: RequestKind::Emergency,
            priority: Priority::High,
            created_at,
            sla_deadline: created_at + deadline_offset,
            linked_report_id: None,
            actual_start: None,
            actual_end: None,
        }
    }

    #[test]
    fn deadline_table_matches_contract_terms() {
        let policy = SlaPolicy::default();
        let t = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        assert_eq!(
            policy.deadline(RequestKind::Emergency, Priority::High, t),
            t + Duration::hours(4)
        );
        assert_eq!(
            policy.deadline(RequestKind::Emergency, Priority::Medium, t),
            t + Duration::hours(8)
        );
        assert_eq!(policy.deadline(RequestKind::Routine, Priority::High, t), t + Duration::days(1));
        assert_eq!(
            policy.deadline(RequestKind::Routine, Priority::Medium, t),
            t + Duration::days(3)
        );
        assert_eq!(policy.deadline(RequestKind::Routine, Priority::Low, t), t + Duration::days(3));
        assert_eq!(
            policy.deadline(RequestKind::Emergency, Priority::Low, t),
            t + Duration::days(3)
        );
    }

    #[test]
    fn open_request_past_deadline_breaches() {
        let request = request(RequestStatus::Open, Duration::days(-1));
        let now = request.created_at;

        let breach = check_breach(&request, now).expect("breach expected");
        assert_eq!(breach.request_id, request.id);
        assert_eq!(breach.deadline, request.sla_deadline);
        assert_eq!(breach.observed_at, now);
    }

    #[test]
    fn resolved_requests_never_breach() {
        for status in [RequestStatus::Completed, RequestStatus::Closed] {
            let request = request(status, Duration::days(-10));
            assert_eq!(check_breach(&request, request.created_at), None);
        }
    }

    #[test]
    fn cancelled_requests_still_report_breaches() {
        // Matches the upstream check: anything not Completed/Closed counts.
        let request = request(RequestStatus::Cancelled, Duration::days(-2));
        assert!(check_breach(&request, request.created_at).is_some());
    }

    #[test]
    fn same_day_deadline_does_not_breach_before_midnight() {
        // 4h past the deadline but still the same calendar day.
        let request = request(RequestStatus::Open, Duration::hours(2));
        let now = request.created_at + Duration::hours(6);
        assert_eq!(check_breach(&request, now), None);

        // The day after, it reports.
        let next_day = request.created_at + Duration::days(1);
        assert!(check_breach(&request, next_day).is_some());
    }

    #[test]
    fn breach_evaluation_is_idempotent() {
        let request = request(RequestStatus::InProgress, Duration::days(-1));
        let now = request.created_at;

        let first = check_breach(&request, now);
        let second = check_breach(&request, now);
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn fixed_clock_returns_its_instant() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert_eq!(FixedClock(instant).now(), instant);
    }
}
