use async_trait::async_trait;

use portgate_core::deadline::EscalationPriority;
use portgate_core::domain::escalation::{
    Escalation, EscalationDecision, EscalationId, EscalationKind, EscalationStatus,
};
use portgate_core::domain::request::RequestId;

use super::{
    get_opt_text, get_text, parse_optional_timestamp, parse_timestamp, EscalationRepository,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlEscalationRepository {
    pool: DbPool,
}

impl SqlEscalationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_escalation_priority(raw: &str) -> Result<EscalationPriority, RepositoryError> {
    match raw {
        "low" => Ok(EscalationPriority::Low),
        "medium" => Ok(EscalationPriority::Medium),
        "high" => Ok(EscalationPriority::High),
        "critical" => Ok(EscalationPriority::Critical),
        _ => Err(RepositoryError::Decode(format!("unknown escalation priority `{raw}`"))),
    }
}

fn row_to_escalation(row: &sqlx::sqlite::SqliteRow) -> Result<Escalation, RepositoryError> {
    let kind = get_text(row, "kind")?;
    let status = get_text(row, "status")?;
    let decision = get_opt_text(row, "decision")?;

    Ok(Escalation {
        id: EscalationId(get_text(row, "id")?),
        code: get_text(row, "code")?,
        request_id: RequestId(get_text(row, "request_id")?),
        kind: EscalationKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown escalation kind `{kind}`")))?,
        priority: parse_escalation_priority(&get_text(row, "priority")?)?,
        raised_by: get_text(row, "raised_by")?,
        assigned_to: get_opt_text(row, "assigned_to")?,
        motive: get_text(row, "motive")?,
        description: get_text(row, "description")?,
        status: EscalationStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown escalation status `{status}`")))?,
        decision: decision
            .map(|raw| {
                EscalationDecision::parse(&raw).ok_or_else(|| {
                    RepositoryError::Decode(format!("unknown escalation decision `{raw}`"))
                })
            })
            .transpose()?,
        resolution: get_text(row, "resolution")?,
        resolved_by: get_opt_text(row, "resolved_by")?,
        resolved_at: parse_optional_timestamp(get_opt_text(row, "resolved_at")?)?,
        due_at: parse_timestamp(&get_text(row, "due_at")?)?,
        created_at: parse_timestamp(&get_text(row, "created_at")?)?,
        updated_at: parse_timestamp(&get_text(row, "updated_at")?)?,
    })
}

const SELECT_ESCALATION: &str = "SELECT id, code, request_id, kind, priority, raised_by,
        assigned_to, motive, description, status, decision, resolution, resolved_by, resolved_at,
        due_at, created_at, updated_at
 FROM escalation";

#[async_trait]
impl EscalationRepository for SqlEscalationRepository {
    async fn find_by_id(&self, id: &EscalationId) -> Result<Option<Escalation>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_ESCALATION} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_escalation(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, escalation: Escalation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO escalation (id, code, request_id, kind, priority, raised_by, assigned_to,
                 motive, description, status, decision, resolution, resolved_by, resolved_at,
                 due_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 assigned_to = excluded.assigned_to,
                 status = excluded.status,
                 decision = excluded.decision,
                 resolution = excluded.resolution,
                 resolved_by = excluded.resolved_by,
                 resolved_at = excluded.resolved_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&escalation.id.0)
        .bind(&escalation.code)
        .bind(&escalation.request_id.0)
        .bind(escalation.kind.as_str())
        .bind(escalation.priority.as_str())
        .bind(&escalation.raised_by)
        .bind(&escalation.assigned_to)
        .bind(&escalation.motive)
        .bind(&escalation.description)
        .bind(escalation.status.as_str())
        .bind(escalation.decision.map(|decision| decision.as_str()))
        .bind(&escalation.resolution)
        .bind(&escalation.resolved_by)
        .bind(escalation.resolved_at.map(|at| at.to_rfc3339()))
        .bind(escalation.due_at.to_rfc3339())
        .bind(escalation.created_at.to_rfc3339())
        .bind(escalation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_open_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<Escalation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{SELECT_ESCALATION} WHERE request_id = ? AND status IN ('pending', 'in_review')
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(&request_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref row) => Ok(Some(row_to_escalation(row)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<Escalation>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_ESCALATION} WHERE status = 'pending' ORDER BY due_at LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_escalation).collect()
    }
}
