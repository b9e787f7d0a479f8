use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use portgate_core::audit::RequestEvent;
use portgate_core::codes::CodeKind;
use portgate_core::domain::access::{AccessRecord, AccessRecordId, Discrepancy, DiscrepancyId};
use portgate_core::domain::authorization::{Authorization, AuthorizationId, VerificationToken};
use portgate_core::domain::escalation::{Escalation, EscalationId};
use portgate_core::domain::extension::{ExtensionId, ExtensionRequest};
use portgate_core::domain::request::{Request, RequestId};
use portgate_core::lifecycle::VesselConflict;

pub mod access_log;
pub mod authorization;
pub mod codes;
pub mod escalation;
pub mod event;
pub mod extension;
pub mod memory;
pub mod request;

pub use access_log::SqlAccessLogRepository;
pub use authorization::SqlAuthorizationRepository;
pub use codes::SqlCodeAllocator;
pub use escalation::SqlEscalationRepository;
pub use event::SqlEventRepository;
pub use extension::SqlExtensionRepository;
pub use memory::{
    InMemoryAuthorizationRepository, InMemoryCodeAllocator, InMemoryEventRepository,
    InMemoryRequestRepository,
};
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("code space exhausted for {kind} in {year}")]
    CodeSpaceExhausted { kind: &'static str, year: i32 },
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Request>, RepositoryError>;
    async fn save(&self, request: Request) -> Result<(), RepositoryError>;
    /// Removes a request row. Only drafts are ever deleted; the caller
    /// enforces that rule before asking.
    async fn delete(&self, id: &RequestId) -> Result<(), RepositoryError>;
    /// Active requests sharing a vessel IMO, excluding the candidate.
    async fn active_conflicts_for_vessel(
        &self,
        imo_number: &str,
        exclude: Option<&RequestId>,
    ) -> Result<Vec<VesselConflict>, RepositoryError>;
    /// Open requests whose due time has passed, for the optional sweep.
    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Request>, RepositoryError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// INSERT-only; audit rows are never updated or deleted.
    async fn append(&self, event: RequestEvent) -> Result<(), RepositoryError>;
    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<RequestEvent>, RepositoryError>;
}

#[async_trait]
pub trait EscalationRepository: Send + Sync {
    async fn find_by_id(&self, id: &EscalationId) -> Result<Option<Escalation>, RepositoryError>;
    async fn save(&self, escalation: Escalation) -> Result<(), RepositoryError>;
    async fn find_open_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<Escalation>, RepositoryError>;
    async fn list_pending(&self, limit: u32) -> Result<Vec<Escalation>, RepositoryError>;
}

#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &AuthorizationId,
    ) -> Result<Option<Authorization>, RepositoryError>;
    async fn find_by_token(
        &self,
        token: &VerificationToken,
    ) -> Result<Option<Authorization>, RepositoryError>;
    async fn find_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<Authorization>, RepositoryError>;
    async fn save(&self, authorization: Authorization) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ExtensionRepository: Send + Sync {
    async fn find_by_id(&self, id: &ExtensionId)
        -> Result<Option<ExtensionRequest>, RepositoryError>;
    async fn save(&self, extension: ExtensionRequest) -> Result<(), RepositoryError>;
    async fn list_for_authorization(
        &self,
        authorization_id: &AuthorizationId,
    ) -> Result<Vec<ExtensionRequest>, RepositoryError>;
}

#[async_trait]
pub trait AccessLogRepository: Send + Sync {
    /// INSERT-only; gate records are never updated or deleted.
    async fn append_record(&self, record: AccessRecord) -> Result<(), RepositoryError>;
    async fn list_records_for_authorization(
        &self,
        authorization_id: &AuthorizationId,
    ) -> Result<Vec<AccessRecord>, RepositoryError>;
    async fn find_record_by_id(
        &self,
        id: &AccessRecordId,
    ) -> Result<Option<AccessRecord>, RepositoryError>;
    async fn save_discrepancy(&self, discrepancy: Discrepancy) -> Result<(), RepositoryError>;
    async fn find_discrepancy_by_id(
        &self,
        id: &DiscrepancyId,
    ) -> Result<Option<Discrepancy>, RepositoryError>;
}

/// Durable code allocation. Implementations must guarantee that two
/// concurrent allocations for the same kind/year never return the same code.
#[async_trait]
pub trait CodeAllocator: Send + Sync {
    async fn allocate(&self, kind: CodeKind, year: i32) -> Result<String, RepositoryError>;
}

pub(crate) fn get_text(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<String, RepositoryError> {
    use sqlx::Row;
    row.try_get(column).map_err(|error| RepositoryError::Decode(error.to_string()))
}

pub(crate) fn get_opt_text(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<Option<String>, RepositoryError> {
    use sqlx::Row;
    row.try_get(column).map_err(|error| RepositoryError::Decode(error.to_string()))
}

pub(crate) fn get_i64(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<i64, RepositoryError> {
    use sqlx::Row;
    row.try_get(column).map_err(|error| RepositoryError::Decode(error.to_string()))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{raw}`: {error}")))
}

pub(crate) fn parse_optional_timestamp(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|raw| parse_timestamp(&raw)).transpose()
}
