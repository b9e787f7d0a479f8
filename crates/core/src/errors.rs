use thiserror::Error;

use crate::codes::CodeKind;
use crate::domain::request::RequestStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid request transition from {from:?} to {to:?}")]
    InvalidRequestTransition { from: RequestStatus, to: RequestStatus },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("an active request {existing_code} already exists for vessel IMO {imo_number}")]
    DuplicateVesselRequest { imo_number: String, existing_code: String },
    #[error("{entity} in state `{current}` does not allow {attempted}")]
    StateConflict { entity: &'static str, current: String, attempted: &'static str },
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("code space exhausted for {kind:?} in {year}")]
    CodeSpaceExhausted { kind: CodeKind, year: i32 },
    #[error("domain invariant violation: {0}")]
    Invariant(String),
}

impl DomainError {
    /// Fatal errors indicate systemic data corruption rather than a
    /// user-correctable condition; callers should abort the operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CodeSpaceExhausted { .. } | Self::Invariant(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::{ApplicationError, DomainError};
    use crate::codes::CodeKind;

    #[test]
    fn exhausted_code_space_is_fatal() {
        let error = DomainError::CodeSpaceExhausted { kind: CodeKind::Request, year: 2024 };
        assert!(error.is_fatal());
    }

    #[test]
    fn validation_errors_are_not_fatal() {
        let error = DomainError::Validation("a rejection reason is required".to_owned());
        assert!(!error.is_fatal());
    }

    #[test]
    fn domain_errors_lift_into_application_errors() {
        let error = ApplicationError::from(DomainError::NotFound {
            entity: "request",
            key: "SOL-2024-001".to_owned(),
        });
        assert!(matches!(error, ApplicationError::Domain(DomainError::NotFound { .. })));
    }
}
