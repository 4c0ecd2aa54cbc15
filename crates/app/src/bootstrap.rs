use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use fieldops_core::audit::{AuditEvent, AuditSink};
use fieldops_core::config::{AppConfig, ConfigError, LoadOptions};
use fieldops_core::identity::Role;
use fieldops_core::sla::SystemClock;
use fieldops_dispatch::{
    NoopDeliveryTransport, NoopDispatcher, NotificationDispatcher, QueueDispatcher,
};
use fieldops_store::{
    connect_with_settings, migrations, DbPool, SqlInvoiceRepository, SqlServiceObjectRepository,
    SqlServiceReportRepository, SqlServiceRequestRepository,
};

use crate::services::{InvoiceService, ReportService, RequestService};
use crate::sweep::SlaSweep;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub requests: Arc<RequestService>,
    pub reports: Arc<ReportService>,
    pub invoices: Arc<InvoiceService>,
    pub sweep: Arc<SlaSweep>,
    pub dispatch_worker: Option<JoinHandle<()>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Audit sink for the daemon: events land in the structured log stream.
#[derive(Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let metadata = serde_json::to_string(&event.metadata).unwrap_or_default();
        info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            actor = %event.actor,
            subject = event.subject_id.as_deref().unwrap_or("unknown"),
            outcome = ?event.outcome,
            metadata = %metadata,
            "audit event"
        );
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let (dispatcher, dispatch_worker): (Arc<dyn NotificationDispatcher>, Option<JoinHandle<()>>) =
        if config.notifications.enabled {
            let (dispatcher, worker) = QueueDispatcher::start(NoopDeliveryTransport);
            (Arc::new(dispatcher), Some(worker))
        } else {
            (Arc::new(NoopDispatcher), None)
        };

    let breach_roles = parse_breach_roles(&config.notifications.sla_breach_roles);

    let requests_repo = Arc::new(SqlServiceRequestRepository::new(db_pool.clone()));
    let objects_repo = Arc::new(SqlServiceObjectRepository::new(db_pool.clone()));
    let reports_repo = Arc::new(SqlServiceReportRepository::new(db_pool.clone()));
    let invoices_repo = Arc::new(SqlInvoiceRepository::new(db_pool.clone()));
    let audit = Arc::new(TracingAuditSink);
    let clock = Arc::new(SystemClock);

    let requests = Arc::new(RequestService::new(
        requests_repo.clone(),
        objects_repo,
        dispatcher.clone(),
        audit.clone(),
        clock.clone(),
        config.sla.policy(),
        breach_roles.clone(),
    ));
    let reports = Arc::new(ReportService::new(
        reports_repo,
        requests_repo.clone(),
        dispatcher.clone(),
        audit.clone(),
        clock.clone(),
    ));
    let invoices =
        Arc::new(InvoiceService::new(invoices_repo, dispatcher.clone(), audit, clock.clone()));
    let sweep = Arc::new(SlaSweep::new(requests_repo, dispatcher, clock, breach_roles));

    Ok(Application { config, db_pool, requests, reports, invoices, sweep, dispatch_worker })
}

fn parse_breach_roles(names: &[String]) -> Vec<Role> {
    let mut roles = Vec::new();
    for name in names {
        match Role::parse(name) {
            Some(role) => roles.push(role),
            None => warn!(role = %name, "unknown sla breach recipient role ignored"),
        }
    }
    roles
}

#[cfg(test)]
mod tests {
    use fieldops_core::config::{ConfigOverrides, LoadOptions};

    use super::{bootstrap, parse_breach_roles};

    fn memory_overrides() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_connects_migrates_and_wires_services() {
        let app = bootstrap(memory_overrides()).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('service_object', 'service_request', 'service_report', 'report_work_item', 'invoice')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("baseline tables present");
        assert_eq!(table_count, 5);

        assert!(app.dispatch_worker.is_some(), "notifications default to enabled");
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn disabled_notifications_skip_the_dispatch_worker() {
        let mut options = memory_overrides();
        options.overrides.notifications_enabled = Some(false);

        let app = bootstrap(options).await.expect("bootstrap");
        assert!(app.dispatch_worker.is_none());
        app.db_pool.close().await;
    }

    #[test]
    fn breach_role_parsing_drops_unknown_names() {
        let roles = parse_breach_roles(&[
            "Administrator".to_string(),
            "Department Head".to_string(),
            "Site Wizard".to_string(),
        ]);
        assert_eq!(
            roles,
            vec![
                fieldops_core::identity::Role::Administrator,
                fieldops_core::identity::Role::DepartmentHead
            ]
        );
    }
}
