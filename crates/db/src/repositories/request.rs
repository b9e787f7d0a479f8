use async_trait::async_trait;
use chrono::{DateTime, Utc};

use portgate_core::deadline::RequestPriority;
use portgate_core::documents::{DocumentHandle, DocumentKind, DocumentMetadata};
use portgate_core::domain::request::{Request, RequestId, RequestStatus, Vehicle, VehicleKind};
use portgate_core::lifecycle::VesselConflict;

use super::{
    get_i64, get_opt_text, get_text, parse_optional_timestamp, parse_timestamp, RepositoryError,
    RequestRepository,
};
use crate::DbPool;

const ACTIVE_STATUSES: &str =
    "'submitted', 'unassigned', 'pending', 'in_review', 'documents_requested', 'escalated', 'approved'";
const OPEN_STATUSES: &str =
    "'submitted', 'unassigned', 'pending', 'in_review', 'documents_requested', 'escalated'";

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_vehicles(&self, request_id: &RequestId) -> Result<Vec<Vehicle>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT plate, kind, driver_name, driver_licence
             FROM request_vehicle WHERE request_id = ? ORDER BY plate",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_vehicle).collect()
    }

    async fn load_documents(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<DocumentMetadata>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT handle, kind, original_name, size_bytes, verified, verified_by, verified_at, uploaded_at
             FROM request_document WHERE request_id = ? ORDER BY uploaded_at",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn hydrate(
        &self,
        row: &sqlx::sqlite::SqliteRow,
    ) -> Result<Request, RepositoryError> {
        let mut request = row_to_request(row)?;
        request.vehicles = self.load_vehicles(&request.id).await?;
        request.documents = self.load_documents(&request.id).await?;
        Ok(request)
    }
}

pub(crate) fn parse_status(raw: &str) -> Result<RequestStatus, RepositoryError> {
    RequestStatus::parse(raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown request status `{raw}`")))
}

pub(crate) fn parse_priority(raw: &str) -> Result<RequestPriority, RepositoryError> {
    match raw {
        "normal" => Ok(RequestPriority::Normal),
        "high" => Ok(RequestPriority::High),
        "critical" => Ok(RequestPriority::Critical),
        "vip" => Ok(RequestPriority::Vip),
        _ => Err(RepositoryError::Decode(format!("unknown request priority `{raw}`"))),
    }
}

fn row_to_vehicle(row: &sqlx::sqlite::SqliteRow) -> Result<Vehicle, RepositoryError> {
    let kind = get_text(row, "kind")?;
    Ok(Vehicle {
        plate: get_text(row, "plate")?,
        kind: VehicleKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown vehicle kind `{kind}`")))?,
        driver_name: get_text(row, "driver_name")?,
        driver_licence: get_opt_text(row, "driver_licence")?,
    })
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentMetadata, RepositoryError> {
    let kind = get_text(row, "kind")?;
    let size_bytes = get_i64(row, "size_bytes")?;
    let verified = get_i64(row, "verified")?;
    Ok(DocumentMetadata {
        handle: DocumentHandle(get_text(row, "handle")?),
        kind: DocumentKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown document kind `{kind}`")))?,
        original_name: get_text(row, "original_name")?,
        size_bytes: size_bytes.max(0) as u64,
        verified: verified != 0,
        verified_by: get_opt_text(row, "verified_by")?,
        verified_at: parse_optional_timestamp(get_opt_text(row, "verified_at")?)?,
        uploaded_at: parse_timestamp(&get_text(row, "uploaded_at")?)?,
    })
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<Request, RepositoryError> {
    let status = get_text(row, "status")?;
    let priority = get_text(row, "priority")?;
    let sla_hours = get_i64(row, "sla_hours")?;

    Ok(Request {
        id: RequestId(get_text(row, "id")?),
        code: get_text(row, "code")?,
        imo_number: get_opt_text(row, "imo_number")?,
        shipping_line: get_opt_text(row, "shipping_line")?,
        applicant_party: get_text(row, "applicant_party")?,
        applicant_name: get_text(row, "applicant_name")?,
        applicant_id_number: get_text(row, "applicant_id_number")?,
        company_name: get_text(row, "company_name")?,
        company_tax_id: get_text(row, "company_tax_id")?,
        port_name: get_text(row, "port_name")?,
        place_name: get_opt_text(row, "place_name")?,
        access_purpose: get_text(row, "access_purpose")?,
        entry_at: parse_timestamp(&get_text(row, "entry_at")?)?,
        exit_at: parse_timestamp(&get_text(row, "exit_at")?)?,
        description: get_text(row, "description")?,
        priority: parse_priority(&priority)?,
        status: parse_status(&status)?,
        assigned_evaluator: get_opt_text(row, "assigned_evaluator")?,
        evaluated_at: parse_optional_timestamp(get_opt_text(row, "evaluated_at")?)?,
        evaluation_comments: get_text(row, "evaluation_comments")?,
        rejection_reason: get_text(row, "rejection_reason")?,
        due_at: parse_optional_timestamp(get_opt_text(row, "due_at")?)?,
        sla_hours: sla_hours.max(0) as u32,
        submitted_at: parse_optional_timestamp(get_opt_text(row, "submitted_at")?)?,
        vehicles: Vec::new(),
        documents: Vec::new(),
        created_at: parse_timestamp(&get_text(row, "created_at")?)?,
        updated_at: parse_timestamp(&get_text(row, "updated_at")?)?,
    })
}

const SELECT_REQUEST: &str = "SELECT id, code, imo_number, shipping_line, applicant_party,
        applicant_name, applicant_id_number, company_name, company_tax_id, port_name, place_name,
        access_purpose, entry_at, exit_at, description, priority, status, assigned_evaluator,
        evaluated_at, evaluation_comments, rejection_reason, due_at, sla_hours, submitted_at,
        created_at, updated_at
 FROM access_request";

#[async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_REQUEST} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_REQUEST} WHERE code = ?"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn save(&self, request: Request) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO access_request (id, code, imo_number, shipping_line, applicant_party,
                 applicant_name, applicant_id_number, company_name, company_tax_id, port_name,
                 place_name, access_purpose, entry_at, exit_at, description, priority, status,
                 assigned_evaluator, evaluated_at, evaluation_comments, rejection_reason, due_at,
                 sla_hours, submitted_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 imo_number = excluded.imo_number,
                 shipping_line = excluded.shipping_line,
                 port_name = excluded.port_name,
                 place_name = excluded.place_name,
                 access_purpose = excluded.access_purpose,
                 entry_at = excluded.entry_at,
                 exit_at = excluded.exit_at,
                 description = excluded.description,
                 priority = excluded.priority,
                 status = excluded.status,
                 assigned_evaluator = excluded.assigned_evaluator,
                 evaluated_at = excluded.evaluated_at,
                 evaluation_comments = excluded.evaluation_comments,
                 rejection_reason = excluded.rejection_reason,
                 due_at = excluded.due_at,
                 sla_hours = excluded.sla_hours,
                 submitted_at = excluded.submitted_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&request.id.0)
        .bind(&request.code)
        .bind(&request.imo_number)
        .bind(&request.shipping_line)
        .bind(&request.applicant_party)
        .bind(&request.applicant_name)
        .bind(&request.applicant_id_number)
        .bind(&request.company_name)
        .bind(&request.company_tax_id)
        .bind(&request.port_name)
        .bind(&request.place_name)
        .bind(&request.access_purpose)
        .bind(request.entry_at.to_rfc3339())
        .bind(request.exit_at.to_rfc3339())
        .bind(&request.description)
        .bind(request.priority.as_str())
        .bind(request.status.as_str())
        .bind(&request.assigned_evaluator)
        .bind(request.evaluated_at.map(|at| at.to_rfc3339()))
        .bind(&request.evaluation_comments)
        .bind(&request.rejection_reason)
        .bind(request.due_at.map(|at| at.to_rfc3339()))
        .bind(i64::from(request.sla_hours))
        .bind(request.submitted_at.map(|at| at.to_rfc3339()))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM request_vehicle WHERE request_id = ?")
            .bind(&request.id.0)
            .execute(&self.pool)
            .await?;
        for vehicle in &request.vehicles {
            sqlx::query(
                "INSERT INTO request_vehicle (request_id, plate, kind, driver_name, driver_licence)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&request.id.0)
            .bind(&vehicle.plate)
            .bind(vehicle.kind.as_str())
            .bind(&vehicle.driver_name)
            .bind(&vehicle.driver_licence)
            .execute(&self.pool)
            .await?;
        }

        sqlx::query("DELETE FROM request_document WHERE request_id = ?")
            .bind(&request.id.0)
            .execute(&self.pool)
            .await?;
        for document in &request.documents {
            sqlx::query(
                "INSERT INTO request_document (handle, request_id, kind, original_name, size_bytes,
                     verified, verified_by, verified_at, uploaded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&document.handle.0)
            .bind(&request.id.0)
            .bind(document.kind.as_str())
            .bind(&document.original_name)
            .bind(document.size_bytes as i64)
            .bind(i64::from(document.verified))
            .bind(&document.verified_by)
            .bind(document.verified_at.map(|at| at.to_rfc3339()))
            .bind(document.uploaded_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn delete(&self, id: &RequestId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM access_request WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn active_conflicts_for_vessel(
        &self,
        imo_number: &str,
        exclude: Option<&RequestId>,
    ) -> Result<Vec<VesselConflict>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT code, status FROM access_request
             WHERE imo_number = ? AND status IN ({ACTIVE_STATUSES}) AND id != ?
             ORDER BY created_at"
        ))
        .bind(imo_number)
        .bind(exclude.map(|id| id.0.as_str()).unwrap_or(""))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(VesselConflict {
                    code: get_text(row, "code")?,
                    status: parse_status(&get_text(row, "status")?)?,
                })
            })
            .collect()
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Request>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_REQUEST} WHERE due_at IS NOT NULL AND due_at < ?
             AND status IN ({OPEN_STATUSES}) ORDER BY due_at"
        ))
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut requests = Vec::with_capacity(rows.len());
        for row in &rows {
            requests.push(self.hydrate(row).await?);
        }
        Ok(requests)
    }
}
