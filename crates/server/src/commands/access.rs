use chrono::{DateTime, Datelike, Utc};

use portgate_core::audit::InMemoryEventRecorder;
use portgate_core::codes::CodeKind;
use portgate_core::domain::access::{
    AccessRecord, ChecklistFlags, Discrepancy, DiscrepancyId, DiscrepancyKind,
};
use portgate_core::domain::authorization::{
    Authorization, AuthorizationId, AuthorizedVehicle, VerificationToken,
};
use portgate_core::domain::extension::{ExtensionId, ExtensionRequest};
use portgate_core::extensions;
use portgate_core::issuance::{self, GateObservation, VerificationStatus};
use portgate_core::notify::{Notification, NotificationCode};

use super::{AppServices, CommandError};

/// Snapshot fields shown to a verifier for a valid credential. Copied from
/// the authorization, never live-linked back to the request.
#[derive(Clone, Debug, serde::Serialize)]
pub struct AuthorizationSnapshot {
    pub code: String,
    pub company_name: String,
    pub representative_name: String,
    pub port_name: String,
    pub place_name: Option<String>,
    pub access_purpose: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub vehicles: Vec<AuthorizedVehicle>,
}

impl AuthorizationSnapshot {
    fn of(authorization: &Authorization) -> Self {
        Self {
            code: authorization.code.clone(),
            company_name: authorization.company_name.clone(),
            representative_name: authorization.representative_name.clone(),
            port_name: authorization.port_name.clone(),
            place_name: authorization.place_name.clone(),
            access_purpose: authorization.access_purpose.clone(),
            valid_from: authorization.valid_from,
            valid_until: authorization.valid_until,
            vehicles: authorization.vehicles.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VerificationReport {
    pub status: VerificationStatus,
    pub snapshot: Option<AuthorizationSnapshot>,
}

#[derive(Clone, Debug)]
pub enum GateDecision {
    Admit,
    Deny { reason: String },
}

#[derive(Clone, Debug)]
pub struct GateOutcome {
    pub record: AccessRecord,
    pub discrepancy: Option<Discrepancy>,
}

#[derive(Clone, Debug)]
pub enum ExtensionDecision {
    Approve { notes: String },
    Reject { reason: String },
}

impl AppServices {
    /// The string rendered into the scannable credential: solely the
    /// verification URL, never PII.
    pub fn credential_payload(&self, authorization: &Authorization) -> String {
        issuance::credential_payload(&self.workflow.verification_base_url, authorization)
    }

    pub async fn load_authorization(
        &self,
        id: &AuthorizationId,
    ) -> Result<Authorization, CommandError> {
        self.authorizations
            .find_by_id(id)
            .await?
            .ok_or_else(|| CommandError::not_found("authorization", id.0.clone()))
    }

    /// The public scan path. Unknown tokens are a distinct outcome, not an
    /// error; lazy expiry is persisted before the answer goes out.
    pub async fn verify_credential(&self, token: &str) -> Result<VerificationReport, CommandError> {
        let now = Utc::now();
        let token = VerificationToken(token.to_owned());
        let Some(mut authorization) = self.authorizations.find_by_token(&token).await? else {
            return Ok(VerificationReport { status: VerificationStatus::NotFound, snapshot: None });
        };

        let outcome = issuance::verify(&mut authorization, now);
        if outcome.state_changed {
            self.authorizations.save(authorization.clone()).await?;
        }

        let snapshot = (outcome.status == VerificationStatus::ValidAndActive)
            .then(|| AuthorizationSnapshot::of(&authorization));
        Ok(VerificationReport { status: outcome.status, snapshot })
    }

    pub async fn revoke_authorization(
        &self,
        id: &AuthorizationId,
        actor: &str,
        reason: &str,
    ) -> Result<Authorization, CommandError> {
        let now = Utc::now();
        let mut authorization = self.load_authorization(id).await?;

        let recorder = InMemoryEventRecorder::default();
        issuance::revoke(&mut authorization, actor, reason, &recorder, now)?;
        self.authorizations.save(authorization.clone()).await?;
        self.persist_events(&recorder).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::AuthorizationRevoked)
                .with_context("authorization_code", authorization.code.clone())
                .with_context("reason", reason),
        );
        Ok(authorization)
    }

    /// Gate admission or denial. A failed checklist automatically opens a
    /// discrepancy ticket against the freshly appended record.
    pub async fn record_gate_access(
        &self,
        id: &AuthorizationId,
        decision: GateDecision,
        observation: GateObservation,
    ) -> Result<GateOutcome, CommandError> {
        let now = Utc::now();
        let authorization = self.load_authorization(id).await?;

        let record = match decision {
            GateDecision::Admit => issuance::admit(&authorization, observation, now)?,
            GateDecision::Deny { reason } => {
                issuance::deny(&authorization, observation, &reason, now)?
            }
        };
        self.access_log.append_record(record.clone()).await?;

        let discrepancy = if record.checks.all_passed() {
            None
        } else {
            let code = self.codes.allocate(CodeKind::Discrepancy, now.year()).await?;
            let description =
                format!("Failed gate checks: {}", record.checks.failed_checks().join(", "));
            let discrepancy = issuance::raise_discrepancy(
                &record,
                code,
                discrepancy_kind_for(&record.checks),
                &description,
                &record.verifying_agent,
                now,
            )?;
            self.access_log.save_discrepancy(discrepancy.clone()).await?;
            Some(discrepancy)
        };

        Ok(GateOutcome { record, discrepancy })
    }

    pub async fn resolve_discrepancy(
        &self,
        id: &DiscrepancyId,
        resolver: &str,
        resolution: &str,
    ) -> Result<Discrepancy, CommandError> {
        let now = Utc::now();
        let mut discrepancy = self
            .access_log
            .find_discrepancy_by_id(id)
            .await?
            .ok_or_else(|| CommandError::not_found("discrepancy", id.0.clone()))?;

        issuance::resolve_discrepancy(&mut discrepancy, resolver, resolution, now)?;
        self.access_log.save_discrepancy(discrepancy.clone()).await?;
        Ok(discrepancy)
    }

    pub async fn request_extension(
        &self,
        id: &AuthorizationId,
        requested_expiry: DateTime<Utc>,
        justification: &str,
        requested_by: &str,
    ) -> Result<ExtensionRequest, CommandError> {
        let now = Utc::now();
        let authorization = self.load_authorization(id).await?;
        let code = self.codes.allocate(CodeKind::Extension, now.year()).await?;

        let recorder = InMemoryEventRecorder::default();
        let extension = extensions::request_extension(
            &authorization,
            code,
            requested_expiry,
            justification,
            requested_by,
            &recorder,
            now,
        )?;
        self.extensions.save(extension.clone()).await?;
        self.persist_events(&recorder).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::ExtensionRequested)
                .with_context("authorization_code", authorization.code.clone())
                .with_context("extension_code", extension.code.clone()),
        );
        Ok(extension)
    }

    pub async fn decide_extension(
        &self,
        id: &ExtensionId,
        approver: &str,
        decision: ExtensionDecision,
    ) -> Result<(ExtensionRequest, Authorization), CommandError> {
        let now = Utc::now();
        let mut extension = self
            .extensions
            .find_by_id(id)
            .await?
            .ok_or_else(|| CommandError::not_found("extension_request", id.0.clone()))?;
        let mut authorization =
            self.load_authorization(&extension.authorization_id.clone()).await?;

        let recorder = InMemoryEventRecorder::default();
        let decision_label = match decision {
            ExtensionDecision::Approve { ref notes } => {
                extensions::approve_extension(
                    &mut extension,
                    &mut authorization,
                    approver,
                    notes,
                    &recorder,
                    now,
                )?;
                self.authorizations.save(authorization.clone()).await?;
                "approved"
            }
            ExtensionDecision::Reject { ref reason } => {
                extensions::reject_extension(
                    &mut extension,
                    &authorization,
                    approver,
                    reason,
                    &recorder,
                    now,
                )?;
                "rejected"
            }
        };
        self.extensions.save(extension.clone()).await?;
        self.persist_events(&recorder).await?;

        self.notify_best_effort(
            Notification::new(NotificationCode::ExtensionDecided)
                .with_context("extension_code", extension.code.clone())
                .with_context("decision", decision_label),
        );
        Ok((extension, authorization))
    }
}

/// Maps a failed checklist to the closest discrepancy category; mixed
/// failures land on the generic incorrect-data bucket.
fn discrepancy_kind_for(checks: &ChecklistFlags) -> DiscrepancyKind {
    match checks.failed_checks().as_slice() {
        ["vehicle"] => DiscrepancyKind::VehicleMismatch,
        ["driver"] => DiscrepancyKind::DriverMismatch,
        ["document"] => DiscrepancyKind::IllegibleDocument,
        _ => DiscrepancyKind::IncorrectData,
    }
}
