use async_trait::async_trait;

use portgate_core::domain::authorization::{
    Authorization, AuthorizationId, AuthorizationStatus, AuthorizedVehicle, VerificationToken,
};
use portgate_core::domain::request::RequestId;

use super::{
    get_opt_text, get_text, parse_optional_timestamp, parse_timestamp, AuthorizationRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlAuthorizationRepository {
    pool: DbPool,
}

impl SqlAuthorizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_authorization(row: &sqlx::sqlite::SqliteRow) -> Result<Authorization, RepositoryError> {
    let status = get_text(row, "status")?;
    let vehicles_raw = get_text(row, "vehicles")?;
    let vehicles: Vec<AuthorizedVehicle> = serde_json::from_str(&vehicles_raw)
        .map_err(|error| RepositoryError::Decode(format!("bad vehicle snapshot: {error}")))?;

    Ok(Authorization {
        id: AuthorizationId(get_text(row, "id")?),
        code: get_text(row, "code")?,
        token: VerificationToken(get_text(row, "token")?),
        request_id: RequestId(get_text(row, "request_id")?),
        company_name: get_text(row, "company_name")?,
        company_tax_id: get_text(row, "company_tax_id")?,
        representative_name: get_text(row, "representative_name")?,
        representative_id_number: get_text(row, "representative_id_number")?,
        port_name: get_text(row, "port_name")?,
        place_name: get_opt_text(row, "place_name")?,
        access_purpose: get_text(row, "access_purpose")?,
        valid_from: parse_timestamp(&get_text(row, "valid_from")?)?,
        valid_until: parse_timestamp(&get_text(row, "valid_until")?)?,
        vehicles,
        status: AuthorizationStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown authorization status `{status}`"))
        })?,
        issued_by: get_text(row, "issued_by")?,
        issued_at: parse_timestamp(&get_text(row, "issued_at")?)?,
        updated_at: parse_timestamp(&get_text(row, "updated_at")?)?,
        revoked_by: get_opt_text(row, "revoked_by")?,
        revoked_at: parse_optional_timestamp(get_opt_text(row, "revoked_at")?)?,
        revocation_reason: get_text(row, "revocation_reason")?,
    })
}

const SELECT_AUTHORIZATION: &str = "SELECT id, code, token, request_id, company_name,
        company_tax_id, representative_name, representative_id_number, port_name, place_name,
        access_purpose, valid_from, valid_until, vehicles, status, issued_by, issued_at,
        updated_at, revoked_by, revoked_at, revocation_reason
 FROM access_authorization";

#[async_trait]
impl AuthorizationRepository for SqlAuthorizationRepository {
    async fn find_by_id(
        &self,
        id: &AuthorizationId,
    ) -> Result<Option<Authorization>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_AUTHORIZATION} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_authorization(row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_token(
        &self,
        token: &VerificationToken,
    ) -> Result<Option<Authorization>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_AUTHORIZATION} WHERE token = ?"))
            .bind(&token.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_authorization(row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<Authorization>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_AUTHORIZATION} WHERE request_id = ?"))
            .bind(&request_id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_authorization(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, authorization: Authorization) -> Result<(), RepositoryError> {
        let vehicles = serde_json::to_string(&authorization.vehicles)
            .map_err(|error| RepositoryError::Decode(format!("bad vehicle snapshot: {error}")))?;

        sqlx::query(
            "INSERT INTO access_authorization (id, code, token, request_id, company_name,
                 company_tax_id, representative_name, representative_id_number, port_name,
                 place_name, access_purpose, valid_from, valid_until, vehicles, status, issued_by,
                 issued_at, updated_at, revoked_by, revoked_at, revocation_reason)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 valid_until = excluded.valid_until,
                 status = excluded.status,
                 updated_at = excluded.updated_at,
                 revoked_by = excluded.revoked_by,
                 revoked_at = excluded.revoked_at,
                 revocation_reason = excluded.revocation_reason",
        )
        .bind(&authorization.id.0)
        .bind(&authorization.code)
        .bind(&authorization.token.0)
        .bind(&authorization.request_id.0)
        .bind(&authorization.company_name)
        .bind(&authorization.company_tax_id)
        .bind(&authorization.representative_name)
        .bind(&authorization.representative_id_number)
        .bind(&authorization.port_name)
        .bind(&authorization.place_name)
        .bind(&authorization.access_purpose)
        .bind(authorization.valid_from.to_rfc3339())
        .bind(authorization.valid_until.to_rfc3339())
        .bind(vehicles)
        .bind(authorization.status.as_str())
        .bind(&authorization.issued_by)
        .bind(authorization.issued_at.to_rfc3339())
        .bind(authorization.updated_at.to_rfc3339())
        .bind(&authorization.revoked_by)
        .bind(authorization.revoked_at.map(|at| at.to_rfc3339()))
        .bind(&authorization.revocation_reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
