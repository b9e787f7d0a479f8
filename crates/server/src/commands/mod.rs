//! Application command handlers.
//!
//! Each handler is one explicit sequence: load the aggregates, apply the
//! domain transition, persist, append the buffered audit events, then fire
//! the best-effort notification. Side effects never hide behind saves.

pub mod access;
pub mod requests;

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use portgate_core::audit::InMemoryEventRecorder;
use portgate_core::config::WorkflowConfig;
use portgate_core::documents::DocumentStore;
use portgate_core::errors::DomainError;
use portgate_core::notify::{Notification, NotificationClient};
use portgate_db::repositories::{
    AccessLogRepository, AuthorizationRepository, CodeAllocator, EscalationRepository,
    EventRepository, ExtensionRepository, RepositoryError, RequestRepository,
    SqlAccessLogRepository, SqlAuthorizationRepository, SqlCodeAllocator, SqlEscalationRepository,
    SqlEventRepository, SqlExtensionRepository, SqlRequestRepository,
};
use portgate_db::DbPool;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Repository(String),
    #[error("fatal failure: {0}")]
    Fatal(String),
}

impl From<RepositoryError> for CommandError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::CodeSpaceExhausted { .. } => Self::Fatal(error.to_string()),
            other => Self::Repository(other.to_string()),
        }
    }
}

impl CommandError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Domain(DomainError::NotFound { entity, key: key.into() })
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub requests: Arc<dyn RequestRepository>,
    pub events: Arc<dyn EventRepository>,
    pub escalations: Arc<dyn EscalationRepository>,
    pub authorizations: Arc<dyn AuthorizationRepository>,
    pub extensions: Arc<dyn ExtensionRepository>,
    pub access_log: Arc<dyn AccessLogRepository>,
    pub codes: Arc<dyn CodeAllocator>,
    pub notifier: Arc<dyn NotificationClient>,
    pub documents: Arc<dyn DocumentStore>,
    pub workflow: WorkflowConfig,
}

impl AppServices {
    pub fn sql(
        pool: DbPool,
        workflow: WorkflowConfig,
        notifier: Arc<dyn NotificationClient>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            requests: Arc::new(SqlRequestRepository::new(pool.clone())),
            events: Arc::new(SqlEventRepository::new(pool.clone())),
            escalations: Arc::new(SqlEscalationRepository::new(pool.clone())),
            authorizations: Arc::new(SqlAuthorizationRepository::new(pool.clone())),
            extensions: Arc::new(SqlExtensionRepository::new(pool.clone())),
            access_log: Arc::new(SqlAccessLogRepository::new(pool.clone())),
            codes: Arc::new(SqlCodeAllocator::new(pool)),
            notifier,
            documents,
            workflow,
        }
    }

    /// Drains the command's buffered audit events into durable storage, in
    /// emission order.
    pub(crate) async fn persist_events(
        &self,
        recorder: &InMemoryEventRecorder,
    ) -> Result<(), CommandError> {
        for event in recorder.drain() {
            self.events.append(event).await?;
        }
        Ok(())
    }

    /// Fire-and-forget notification: failures are logged, never propagated.
    pub(crate) fn notify_best_effort(&self, notification: Notification) {
        let code = notification.code;
        if let Err(error) = self.notifier.notify(notification) {
            warn!(
                event_name = "notify.delivery_failed",
                notification_code = code.as_str(),
                error = %error,
                "notification delivery failed; continuing"
            );
        }
    }
}
