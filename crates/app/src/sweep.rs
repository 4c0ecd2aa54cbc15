use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use fieldops_core::identity::Role;
use fieldops_core::sla::{check_breach, Clock};
use fieldops_dispatch::{sla_breach, NotificationDispatcher};
use fieldops_store::ServiceRequestRepository;

use crate::errors::ServiceError;

/// Periodic breach scan over every request still carrying SLA obligations.
/// Re-reports known breaches on each pass; duplicate suppression belongs to
/// the delivery side.
pub struct SlaSweep {
    requests: Arc<dyn ServiceRequestRepository>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    breach_roles: Vec<Role>,
}

impl SlaSweep {
    pub fn new(
        requests: Arc<dyn ServiceRequestRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        breach_roles: Vec<Role>,
    ) -> Self {
        Self { requests, dispatcher, clock, breach_roles }
    }

    /// Returns how many breaches were reported this pass.
    pub async fn run_once(&self) -> Result<usize, ServiceError> {
        let now = self.clock.now();
        let open_requests = self.requests.list_unresolved().await?;

        let mut reported = 0;
        for request in &open_requests {
            if let Some(breach) = check_breach(request, now) {
                warn!(
                    request_id = %breach.request_id.0,
                    deadline = %breach.deadline,
                    "sla breach detected"
                );
                self.dispatcher.enqueue(sla_breach(&breach, self.breach_roles.clone()));
                reported += 1;
            }
        }

        info!(scanned = open_requests.len(), reported, "sla sweep pass finished");
        Ok(reported)
    }

    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(error) = self.run_once().await {
                    // Transient store failures wait for the next tick.
                    warn!(%error, "sla sweep pass failed");
                }
            }
        })
    }
}
