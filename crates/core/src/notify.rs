//! Notification Collaborator seam. Delivery is fire-and-forget: a failed
//! notification is reported to the caller for logging but must never block
//! or roll back the transition that produced it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCode {
    RequestReceived,
    RequestApproved,
    RequestRejected,
    EvaluatorAssigned,
    DocumentsRequested,
    EscalationRaised,
    EscalationResolved,
    AuthorizationRevoked,
    ExtensionRequested,
    ExtensionDecided,
}

impl NotificationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestReceived => "request_received",
            Self::RequestApproved => "request_approved",
            Self::RequestRejected => "request_rejected",
            Self::EvaluatorAssigned => "evaluator_assigned",
            Self::DocumentsRequested => "documents_requested",
            Self::EscalationRaised => "escalation_raised",
            Self::EscalationResolved => "escalation_resolved",
            Self::AuthorizationRevoked => "authorization_revoked",
            Self::ExtensionRequested => "extension_requested",
            Self::ExtensionDecided => "extension_decided",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub code: NotificationCode,
    pub context: BTreeMap<String, String>,
    pub extra_recipients: Vec<String>,
}

impl Notification {
    pub fn new(code: NotificationCode) -> Self {
        Self { code, context: BTreeMap::new(), extra_recipients: Vec::new() }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.extra_recipients.push(recipient.into());
        self
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("notification delivery failed: {0}")]
pub struct NotificationError(pub String);

pub trait NotificationClient: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

pub struct NoopNotificationClient;

impl NotificationClient for NoopNotificationClient {
    fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationClient {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl InMemoryNotificationClient {
    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationClient for InMemoryNotificationClient {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}
