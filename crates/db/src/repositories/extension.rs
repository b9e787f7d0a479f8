use async_trait::async_trait;

use portgate_core::domain::authorization::AuthorizationId;
use portgate_core::domain::extension::{ExtensionId, ExtensionRequest, ExtensionStatus};

use super::{
    get_opt_text, get_text, parse_optional_timestamp, parse_timestamp, ExtensionRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlExtensionRepository {
    pool: DbPool,
}

impl SqlExtensionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_extension(row: &sqlx::sqlite::SqliteRow) -> Result<ExtensionRequest, RepositoryError> {
    let status = get_text(row, "status")?;
    Ok(ExtensionRequest {
        id: ExtensionId(get_text(row, "id")?),
        code: get_text(row, "code")?,
        authorization_id: AuthorizationId(get_text(row, "authorization_id")?),
        current_expiry: parse_timestamp(&get_text(row, "current_expiry")?)?,
        requested_expiry: parse_timestamp(&get_text(row, "requested_expiry")?)?,
        justification: get_text(row, "justification")?,
        requested_by: get_text(row, "requested_by")?,
        status: ExtensionStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown extension status `{status}`")))?,
        processed_by: get_opt_text(row, "processed_by")?,
        processed_at: parse_optional_timestamp(get_opt_text(row, "processed_at")?)?,
        decision_notes: get_text(row, "decision_notes")?,
        rejection_reason: get_text(row, "rejection_reason")?,
        created_at: parse_timestamp(&get_text(row, "created_at")?)?,
        updated_at: parse_timestamp(&get_text(row, "updated_at")?)?,
    })
}

const SELECT_EXTENSION: &str = "SELECT id, code, authorization_id, current_expiry,
        requested_expiry, justification, requested_by, status, processed_by, processed_at,
        decision_notes, rejection_reason, created_at, updated_at
 FROM extension_request";

#[async_trait]
impl ExtensionRepository for SqlExtensionRepository {
    async fn find_by_id(
        &self,
        id: &ExtensionId,
    ) -> Result<Option<ExtensionRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_EXTENSION} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_extension(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, extension: ExtensionRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO extension_request (id, code, authorization_id, current_expiry,
                 requested_expiry, justification, requested_by, status, processed_by, processed_at,
                 decision_notes, rejection_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 processed_by = excluded.processed_by,
                 processed_at = excluded.processed_at,
                 decision_notes = excluded.decision_notes,
                 rejection_reason = excluded.rejection_reason,
                 updated_at = excluded.updated_at",
        )
        .bind(&extension.id.0)
        .bind(&extension.code)
        .bind(&extension.authorization_id.0)
        .bind(extension.current_expiry.to_rfc3339())
        .bind(extension.requested_expiry.to_rfc3339())
        .bind(&extension.justification)
        .bind(&extension.requested_by)
        .bind(extension.status.as_str())
        .bind(&extension.processed_by)
        .bind(extension.processed_at.map(|at| at.to_rfc3339()))
        .bind(&extension.decision_notes)
        .bind(&extension.rejection_reason)
        .bind(extension.created_at.to_rfc3339())
        .bind(extension.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_authorization(
        &self,
        authorization_id: &AuthorizationId,
    ) -> Result<Vec<ExtensionRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_EXTENSION} WHERE authorization_id = ? ORDER BY created_at DESC"
        ))
        .bind(&authorization_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_extension).collect()
    }
}
