pub mod audit;
pub mod codes;
pub mod config;
pub mod deadline;
pub mod documents;
pub mod domain;
pub mod errors;
pub mod escalations;
pub mod extensions;
pub mod issuance;
pub mod lifecycle;
pub mod notify;

pub use audit::{EventKind, EventRecorder, InMemoryEventRecorder, RequestEvent};
pub use codes::{format_code, parse_sequence, CodeKind, InMemoryIssuedCodes, IssuedCodes};
pub use deadline::{escalation_due_at, request_due_at, EscalationPriority, RequestPriority};
pub use documents::{DocumentHandle, DocumentKind, DocumentMetadata, DocumentStore};
pub use domain::access::{
    AccessDirection, AccessOutcome, AccessRecord, AccessRecordId, ChecklistFlags, Discrepancy,
    DiscrepancyId, DiscrepancyKind, DiscrepancyStatus,
};
pub use domain::authorization::{
    Authorization, AuthorizationId, AuthorizationStatus, AuthorizedVehicle, VerificationToken,
};
pub use domain::escalation::{
    Escalation, EscalationDecision, EscalationId, EscalationKind, EscalationStatus,
};
pub use domain::extension::{ExtensionId, ExtensionRequest, ExtensionStatus};
pub use domain::request::{NewRequest, Request, RequestId, RequestStatus, Vehicle, VehicleKind};
pub use errors::{ApplicationError, DomainError};
pub use issuance::{VerificationOutcome, VerificationStatus};
pub use notify::{
    InMemoryNotificationClient, NoopNotificationClient, Notification, NotificationClient,
    NotificationCode, NotificationError,
};
