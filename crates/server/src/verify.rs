//! Public credential verification endpoint. No authentication: the token is
//! an unguessable random identifier, and a valid response exposes only the
//! snapshot copied at issuance.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use portgate_core::issuance::VerificationStatus;

use crate::commands::access::AuthorizationSnapshot;
use crate::commands::AppServices;

#[derive(Clone)]
pub struct VerifyState {
    services: AppServices,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub status: &'static str,
    pub checked_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<AuthorizationSnapshot>,
}

pub fn router(services: AppServices) -> Router {
    Router::new()
        .route("/verify/{token}", get(verify_token))
        .with_state(VerifyState { services })
}

pub async fn verify_token(
    State(state): State<VerifyState>,
    Path(token): Path<String>,
) -> (StatusCode, Json<VerifyResponse>) {
    match state.services.verify_credential(&token).await {
        Ok(report) => {
            let status_code = match report.status {
                VerificationStatus::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::OK,
            };
            (
                status_code,
                Json(VerifyResponse {
                    status: report.status.as_str(),
                    checked_at: Utc::now().to_rfc3339(),
                    authorization: report.snapshot,
                }),
            )
        }
        Err(err) => {
            error!(
                event_name = "verify.lookup_failed",
                error = %err,
                "credential verification failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerifyResponse {
                    status: "unavailable",
                    checked_at: Utc::now().to_rfc3339(),
                    authorization: None,
                }),
            )
        }
    }
}
