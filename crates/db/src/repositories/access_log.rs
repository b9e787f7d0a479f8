use async_trait::async_trait;

use portgate_core::domain::access::{
    AccessDirection, AccessOutcome, AccessRecord, AccessRecordId, ChecklistFlags, Discrepancy,
    DiscrepancyId, DiscrepancyKind, DiscrepancyStatus,
};
use portgate_core::domain::authorization::AuthorizationId;

use super::{
    get_i64, get_opt_text, get_text, parse_optional_timestamp, parse_timestamp,
    AccessLogRepository, RepositoryError,
};
use crate::DbPool;

pub struct SqlAccessLogRepository {
    pool: DbPool,
}

impl SqlAccessLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AccessRecord, RepositoryError> {
    let direction = get_text(row, "direction")?;
    let outcome = get_text(row, "outcome")?;

    Ok(AccessRecord {
        id: AccessRecordId(get_text(row, "id")?),
        authorization_id: AuthorizationId(get_text(row, "authorization_id")?),
        direction: AccessDirection::parse(&direction)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown direction `{direction}`")))?,
        vehicle_plate: get_text(row, "vehicle_plate")?,
        driver_name: get_text(row, "driver_name")?,
        verifying_agent: get_text(row, "verifying_agent")?,
        outcome: AccessOutcome::parse(&outcome)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown outcome `{outcome}`")))?,
        checks: ChecklistFlags {
            document_verified: get_i64(row, "document_verified")? != 0,
            vehicle_verified: get_i64(row, "vehicle_verified")? != 0,
            driver_verified: get_i64(row, "driver_verified")? != 0,
        },
        notes: get_text(row, "notes")?,
        denial_reason: get_text(row, "denial_reason")?,
        recorded_at: parse_timestamp(&get_text(row, "recorded_at")?)?,
    })
}

fn row_to_discrepancy(row: &sqlx::sqlite::SqliteRow) -> Result<Discrepancy, RepositoryError> {
    let kind = get_text(row, "kind")?;
    let status = get_text(row, "status")?;

    Ok(Discrepancy {
        id: DiscrepancyId(get_text(row, "id")?),
        code: get_text(row, "code")?,
        access_record_id: AccessRecordId(get_text(row, "access_record_id")?),
        kind: DiscrepancyKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown discrepancy kind `{kind}`")))?,
        description: get_text(row, "description")?,
        reported_by: get_text(row, "reported_by")?,
        status: DiscrepancyStatus::parse(&status).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown discrepancy status `{status}`"))
        })?,
        assigned_to: get_opt_text(row, "assigned_to")?,
        resolved_by: get_opt_text(row, "resolved_by")?,
        resolution: get_text(row, "resolution")?,
        resolved_at: parse_optional_timestamp(get_opt_text(row, "resolved_at")?)?,
        created_at: parse_timestamp(&get_text(row, "created_at")?)?,
    })
}

#[async_trait]
impl AccessLogRepository for SqlAccessLogRepository {
    async fn append_record(&self, record: AccessRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO access_record (id, authorization_id, direction, vehicle_plate,
                 driver_name, verifying_agent, outcome, document_verified, vehicle_verified,
                 driver_verified, notes, denial_reason, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(&record.authorization_id.0)
        .bind(record.direction.as_str())
        .bind(&record.vehicle_plate)
        .bind(&record.driver_name)
        .bind(&record.verifying_agent)
        .bind(record.outcome.as_str())
        .bind(i64::from(record.checks.document_verified))
        .bind(i64::from(record.checks.vehicle_verified))
        .bind(i64::from(record.checks.driver_verified))
        .bind(&record.notes)
        .bind(&record.denial_reason)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_records_for_authorization(
        &self,
        authorization_id: &AuthorizationId,
    ) -> Result<Vec<AccessRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, authorization_id, direction, vehicle_plate, driver_name, verifying_agent,
                    outcome, document_verified, vehicle_verified, driver_verified, notes,
                    denial_reason, recorded_at
             FROM access_record WHERE authorization_id = ?
             ORDER BY recorded_at, rowid",
        )
        .bind(&authorization_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn find_record_by_id(
        &self,
        id: &AccessRecordId,
    ) -> Result<Option<AccessRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, authorization_id, direction, vehicle_plate, driver_name, verifying_agent,
                    outcome, document_verified, vehicle_verified, driver_verified, notes,
                    denial_reason, recorded_at
             FROM access_record WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_record(row)?)),
            None => Ok(None),
        }
    }

    async fn save_discrepancy(&self, discrepancy: Discrepancy) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO discrepancy (id, code, access_record_id, kind, description, reported_by,
                 status, assigned_to, resolved_by, resolution, resolved_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 assigned_to = excluded.assigned_to,
                 resolved_by = excluded.resolved_by,
                 resolution = excluded.resolution,
                 resolved_at = excluded.resolved_at",
        )
        .bind(&discrepancy.id.0)
        .bind(&discrepancy.code)
        .bind(&discrepancy.access_record_id.0)
        .bind(discrepancy.kind.as_str())
        .bind(&discrepancy.description)
        .bind(&discrepancy.reported_by)
        .bind(discrepancy.status.as_str())
        .bind(&discrepancy.assigned_to)
        .bind(&discrepancy.resolved_by)
        .bind(&discrepancy.resolution)
        .bind(discrepancy.resolved_at.map(|at| at.to_rfc3339()))
        .bind(discrepancy.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_discrepancy_by_id(
        &self,
        id: &DiscrepancyId,
    ) -> Result<Option<Discrepancy>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, code, access_record_id, kind, description, reported_by, status,
                    assigned_to, resolved_by, resolution, resolved_at, created_at
             FROM discrepancy WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_discrepancy(row)?)),
            None => Ok(None),
        }
    }
}
