pub mod bootstrap;
pub mod commands;
pub mod health;
pub mod verify;

pub use commands::access::{
    AuthorizationSnapshot, ExtensionDecision, GateDecision, GateOutcome, VerificationReport,
};
pub use commands::requests::{ApprovalOutcome, EscalationOutcome};
pub use commands::{AppServices, CommandError};
