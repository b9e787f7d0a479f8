use std::collections::BTreeMap;

use async_trait::async_trait;

use portgate_core::audit::{EventKind, RequestEvent};
use portgate_core::domain::request::RequestId;

use super::{get_i64, get_opt_text, get_text, parse_timestamp, EventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEventRepository {
    pool: DbPool,
}

impl SqlEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<RequestEvent, RepositoryError> {
    let kind = get_text(row, "kind")?;
    let metadata_raw = get_text(row, "metadata")?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_raw)
        .map_err(|error| RepositoryError::Decode(format!("bad event metadata: {error}")))?;

    Ok(RequestEvent {
        id: get_text(row, "id")?,
        request_id: RequestId(get_text(row, "request_id")?),
        actor: get_opt_text(row, "actor")?,
        kind: EventKind::parse(&kind)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown event kind `{kind}`")))?,
        title: get_text(row, "title")?,
        description: get_text(row, "description")?,
        metadata,
        visible_to_applicant: get_i64(row, "visible_to_applicant")? != 0,
        internal_only: get_i64(row, "internal_only")? != 0,
        recorded_at: parse_timestamp(&get_text(row, "recorded_at")?)?,
    })
}

#[async_trait]
impl EventRepository for SqlEventRepository {
    async fn append(&self, event: RequestEvent) -> Result<(), RepositoryError> {
        let metadata = serde_json::to_string(&event.metadata)
            .map_err(|error| RepositoryError::Decode(format!("bad event metadata: {error}")))?;

        sqlx::query(
            "INSERT INTO request_event (id, request_id, actor, kind, title, description, metadata,
                 visible_to_applicant, internal_only, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.request_id.0)
        .bind(&event.actor)
        .bind(event.kind.as_str())
        .bind(&event.title)
        .bind(&event.description)
        .bind(metadata)
        .bind(i64::from(event.visible_to_applicant))
        .bind(i64::from(event.internal_only))
        .bind(event.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<RequestEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, request_id, actor, kind, title, description, metadata,
                    visible_to_applicant, internal_only, recorded_at
             FROM request_event WHERE request_id = ?
             ORDER BY recorded_at, rowid",
        )
        .bind(&request_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use portgate_core::audit::{EventKind, RequestEvent};
    use portgate_core::deadline::RequestPriority;
    use portgate_core::domain::request::{NewRequest, Request};

    use super::SqlEventRepository;
    use crate::repositories::{EventRepository, RequestRepository, SqlRequestRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn insert_request(pool: &sqlx::SqlitePool, code: &str) -> Request {
        let repo = SqlRequestRepository::new(pool.clone());
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let request = Request::draft(
            code.to_owned(),
            NewRequest {
                imo_number: None,
                shipping_line: None,
                applicant_party: "user-1".to_owned(),
                applicant_name: "Marta Reyes".to_owned(),
                applicant_id_number: "001-1234567-8".to_owned(),
                company_name: "Caribe Logistics".to_owned(),
                company_tax_id: "130-12345-6".to_owned(),
                port_name: "Puerto Haina".to_owned(),
                place_name: None,
                access_purpose: "Container discharge".to_owned(),
                entry_at: now + Duration::days(3),
                exit_at: now + Duration::days(5),
                description: "Unloading operation".to_owned(),
                priority: RequestPriority::Normal,
                vehicles: Vec::new(),
            },
            now,
        );
        repo.save(request.clone()).await.expect("insert parent request");
        request
    }

    #[tokio::test]
    async fn append_and_list_preserve_order_and_metadata() {
        let pool = setup().await;
        let request = insert_request(&pool, "SOL-2024-001").await;
        let repo = SqlEventRepository::new(pool);

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        repo.append(RequestEvent::new(
            request.id.clone(),
            Some("user-1"),
            EventKind::Created,
            "Request created",
            base,
        ))
        .await
        .expect("append created");
        repo.append(
            RequestEvent::new(request.id.clone(), None, EventKind::PriorityChanged, "Priority updated", base)
                .with_metadata("old", "normal")
                .with_metadata("new", "vip")
                .internal(),
        )
        .await
        .expect("append priority");

        let events = repo.list_for_request(&request.id).await.expect("list");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Created);
        assert_eq!(events[1].kind, EventKind::PriorityChanged);
        assert_eq!(events[1].metadata.get("new").map(String::as_str), Some("vip"));
        assert!(events[1].internal_only);
        assert!(events[1].actor.is_none());
    }

    #[tokio::test]
    async fn events_from_other_requests_are_not_listed() {
        let pool = setup().await;
        let first = insert_request(&pool, "SOL-2024-002").await;
        let second = insert_request(&pool, "SOL-2024-003").await;
        let repo = SqlEventRepository::new(pool);

        repo.append(RequestEvent::new(
            first.id.clone(),
            None,
            EventKind::Created,
            "Request created",
            Utc::now(),
        ))
        .await
        .expect("append");

        let events = repo.list_for_request(&second.id).await.expect("list");
        assert!(events.is_empty());
    }
}
