use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use portgate_core::audit::RequestEvent;
use portgate_core::codes::{CodeKind, InMemoryIssuedCodes};
use portgate_core::domain::authorization::{Authorization, AuthorizationId, VerificationToken};
use portgate_core::domain::request::{Request, RequestId};
use portgate_core::lifecycle::VesselConflict;

use super::{
    AuthorizationRepository, CodeAllocator, EventRepository, RepositoryError, RequestRepository,
};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, Request>>,
}

#[async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.values().find(|request| request.code == code).cloned())
    }

    async fn save(&self, request: Request) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn delete(&self, id: &RequestId) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.remove(&id.0);
        Ok(())
    }

    async fn active_conflicts_for_vessel(
        &self,
        imo_number: &str,
        exclude: Option<&RequestId>,
    ) -> Result<Vec<VesselConflict>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut conflicts: Vec<VesselConflict> = requests
            .values()
            .filter(|request| request.imo_number.as_deref() == Some(imo_number))
            .filter(|request| request.status.is_active())
            .filter(|request| exclude.map_or(true, |id| request.id != *id))
            .map(|request| VesselConflict { code: request.code.clone(), status: request.status })
            .collect();
        conflicts.sort_by(|left, right| left.code.cmp(&right.code));
        Ok(conflicts)
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut overdue: Vec<Request> =
            requests.values().filter(|request| request.is_overdue(now)).cloned().collect();
        overdue.sort_by_key(|request| request.due_at);
        Ok(overdue)
    }
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: RwLock<Vec<RequestEvent>>,
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn append(&self, event: RequestEvent) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        events.push(event);
        Ok(())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<RequestEvent>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events.iter().filter(|event| event.request_id == *request_id).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryAuthorizationRepository {
    authorizations: RwLock<HashMap<String, Authorization>>,
}

#[async_trait]
impl AuthorizationRepository for InMemoryAuthorizationRepository {
    async fn find_by_id(
        &self,
        id: &AuthorizationId,
    ) -> Result<Option<Authorization>, RepositoryError> {
        let authorizations = self.authorizations.read().await;
        Ok(authorizations.get(&id.0).cloned())
    }

    async fn find_by_token(
        &self,
        token: &VerificationToken,
    ) -> Result<Option<Authorization>, RepositoryError> {
        let authorizations = self.authorizations.read().await;
        Ok(authorizations.values().find(|authorization| authorization.token == *token).cloned())
    }

    async fn find_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<Authorization>, RepositoryError> {
        let authorizations = self.authorizations.read().await;
        Ok(authorizations
            .values()
            .find(|authorization| authorization.request_id == *request_id)
            .cloned())
    }

    async fn save(&self, authorization: Authorization) -> Result<(), RepositoryError> {
        let mut authorizations = self.authorizations.write().await;
        authorizations.insert(authorization.id.0.clone(), authorization);
        Ok(())
    }
}

/// Pure-allocator wiring for tests that do not need a database.
#[derive(Default)]
pub struct InMemoryCodeAllocator {
    issued: InMemoryIssuedCodes,
}

#[async_trait]
impl CodeAllocator for InMemoryCodeAllocator {
    async fn allocate(&self, kind: CodeKind, year: i32) -> Result<String, RepositoryError> {
        self.issued.allocate_and_record(kind, year).map_err(|error| match error {
            portgate_core::errors::DomainError::CodeSpaceExhausted { kind, year } => {
                RepositoryError::CodeSpaceExhausted { kind: kind.as_str(), year }
            }
            other => RepositoryError::Decode(other.to_string()),
        })
    }
}
