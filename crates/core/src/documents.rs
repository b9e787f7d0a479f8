//! Document Store collaborator seam. Files live outside the core; the core
//! only records opaque handles plus the metadata declared at upload time.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentHandle(pub String);

impl DocumentHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for DocumentHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    RepresentativeId,
    CompanyRegistry,
    VehicleRegistration,
    DrivingLicence,
    Other,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepresentativeId => "representative_id",
            Self::CompanyRegistry => "company_registry",
            Self::VehicleRegistration => "vehicle_registration",
            Self::DrivingLicence => "driving_licence",
            Self::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "representative_id" => Some(Self::RepresentativeId),
            "company_registry" => Some(Self::CompanyRegistry),
            "vehicle_registration" => Some(Self::VehicleRegistration),
            "driving_licence" => Some(Self::DrivingLicence),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub handle: DocumentHandle,
    pub kind: DocumentKind,
    pub original_name: String,
    pub size_bytes: u64,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentMetadata {
    pub fn declared(
        handle: DocumentHandle,
        kind: DocumentKind,
        original_name: impl Into<String>,
        size_bytes: u64,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            handle,
            kind,
            original_name: original_name.into(),
            size_bytes,
            verified: false,
            verified_by: None,
            verified_at: None,
            uploaded_at,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DocumentStoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

pub trait DocumentStore: Send + Sync {
    /// Whether the store still holds the file behind a handle.
    fn exists(&self, handle: &DocumentHandle) -> Result<bool, DocumentStoreError>;
}

#[derive(Default)]
pub struct InMemoryDocumentStore {
    handles: Mutex<HashSet<String>>,
}

impl InMemoryDocumentStore {
    pub fn register(&self, handle: &DocumentHandle) {
        let mut handles = match self.handles.lock() {
            Ok(handles) => handles,
            Err(poisoned) => poisoned.into_inner(),
        };
        handles.insert(handle.0.clone());
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn exists(&self, handle: &DocumentHandle) -> Result<bool, DocumentStoreError> {
        let handles = match self.handles.lock() {
            Ok(handles) => handles,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(handles.contains(&handle.0))
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentHandle, DocumentStore, InMemoryDocumentStore};

    #[test]
    fn registered_handles_resolve() {
        let store = InMemoryDocumentStore::default();
        let handle = DocumentHandle::new();
        store.register(&handle);

        assert!(store.exists(&handle).unwrap());
        assert!(!store.exists(&DocumentHandle::new()).unwrap());
    }
}
