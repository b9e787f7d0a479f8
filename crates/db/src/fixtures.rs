//! Deterministic demo fixtures for local environments and the CLI `seed`
//! command. Re-seeding cleans the previous dataset first, so the command is
//! idempotent.

use chrono::{Duration, TimeZone, Utc};

use portgate_core::audit::{EventKind, RequestEvent};
use portgate_core::deadline::{request_due_at, RequestPriority};
use portgate_core::domain::authorization::{
    Authorization, AuthorizationId, AuthorizationStatus, AuthorizedVehicle, VerificationToken,
};
use portgate_core::domain::request::{NewRequest, Request, RequestId, RequestStatus, Vehicle, VehicleKind};

use crate::repositories::{
    AuthorizationRepository, EventRepository, RepositoryError, RequestRepository,
    SqlAuthorizationRepository, SqlEventRepository, SqlRequestRepository,
};
use crate::DbPool;

const SEED_REQUEST_IDS: &[&str] = &["seed-request-001", "seed-request-002"];
const SEED_CODES: &[(&str, &str, i64)] =
    &[("request", "SOL-2024-901", 901), ("request", "SOL-2024-902", 902), ("authorization", "AUT-2024-901", 901)];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedReport {
    pub requests: usize,
    pub authorizations: usize,
    pub events: usize,
}

pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
    for id in SEED_REQUEST_IDS {
        sqlx::query("DELETE FROM access_request WHERE id = ?").bind(id).execute(pool).await?;
    }
    for (_, code, _) in SEED_CODES {
        sqlx::query("DELETE FROM issued_code WHERE code = ?").bind(code).execute(pool).await?;
    }
    Ok(())
}

pub async fn seed(pool: &DbPool) -> Result<SeedReport, RepositoryError> {
    clean(pool).await?;

    let requests = SqlRequestRepository::new(pool.clone());
    let events = SqlEventRepository::new(pool.clone());
    let authorizations = SqlAuthorizationRepository::new(pool.clone());

    let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let mut event_count = 0;

    // an approved request with a live authorization
    let mut approved = Request::draft(
        "SOL-2024-901".to_owned(),
        NewRequest {
            imo_number: Some("9074729".to_owned()),
            shipping_line: Some("Blue Anchor Lines".to_owned()),
            applicant_party: "demo-applicant".to_owned(),
            applicant_name: "Marta Reyes".to_owned(),
            applicant_id_number: "001-1234567-8".to_owned(),
            company_name: "Caribe Logistics".to_owned(),
            company_tax_id: "130-12345-6".to_owned(),
            port_name: "Puerto Haina".to_owned(),
            place_name: Some("Muelle 3".to_owned()),
            access_purpose: "Container discharge".to_owned(),
            entry_at: created + Duration::days(2),
            exit_at: created + Duration::days(4),
            description: "Demo: unloading operation".to_owned(),
            priority: RequestPriority::High,
            vehicles: vec![Vehicle {
                plate: "ABC-1234".to_owned(),
                kind: VehicleKind::Truck,
                driver_name: "Pedro Soto".to_owned(),
                driver_licence: Some("LIC-555".to_owned()),
            }],
        },
        created,
    );
    approved.id = RequestId("seed-request-001".to_owned());
    approved.status = RequestStatus::Approved;
    approved.submitted_at = Some(created);
    approved.due_at = Some(request_due_at(RequestPriority::High, created));
    approved.assigned_evaluator = Some("demo-evaluator".to_owned());
    approved.evaluated_at = Some(created + Duration::hours(3));
    approved.evaluation_comments = "Demo approval".to_owned();
    requests.save(approved.clone()).await?;

    for (kind, title) in
        [(EventKind::Created, "Request created"), (EventKind::Submitted, "Request submitted"), (EventKind::Approved, "Request approved")]
    {
        events
            .append(RequestEvent::new(approved.id.clone(), Some("demo-evaluator"), kind, title, created))
            .await?;
        event_count += 1;
    }

    let authorization = Authorization {
        id: AuthorizationId("seed-authorization-001".to_owned()),
        code: "AUT-2024-901".to_owned(),
        token: VerificationToken("seedtokenseedtokenseedtoken90000".to_owned()),
        request_id: approved.id.clone(),
        company_name: approved.company_name.clone(),
        company_tax_id: approved.company_tax_id.clone(),
        representative_name: approved.applicant_name.clone(),
        representative_id_number: approved.applicant_id_number.clone(),
        port_name: approved.port_name.clone(),
        place_name: approved.place_name.clone(),
        access_purpose: approved.access_purpose.clone(),
        valid_from: approved.entry_at,
        valid_until: approved.exit_at,
        vehicles: vec![AuthorizedVehicle {
            plate: "ABC-1234".to_owned(),
            kind: VehicleKind::Truck,
            driver_name: "Pedro Soto".to_owned(),
            driver_licence: Some("LIC-555".to_owned()),
        }],
        status: AuthorizationStatus::Active,
        issued_by: "demo-evaluator".to_owned(),
        issued_at: created + Duration::hours(3),
        updated_at: created + Duration::hours(3),
        revoked_by: None,
        revoked_at: None,
        revocation_reason: String::new(),
    };
    authorizations.save(authorization).await?;

    // a pending request still inside its SLA
    let mut pending = Request::draft(
        "SOL-2024-902".to_owned(),
        NewRequest {
            imo_number: None,
            shipping_line: None,
            applicant_party: "demo-applicant".to_owned(),
            applicant_name: "Luis Peña".to_owned(),
            applicant_id_number: "001-7654321-0".to_owned(),
            company_name: "Muelle Services".to_owned(),
            company_tax_id: "130-99999-1".to_owned(),
            port_name: "Puerto Plata".to_owned(),
            place_name: None,
            access_purpose: "Crane maintenance".to_owned(),
            entry_at: created + Duration::days(5),
            exit_at: created + Duration::days(6),
            description: "Demo: maintenance window".to_owned(),
            priority: RequestPriority::Normal,
            vehicles: Vec::new(),
        },
        created,
    );
    pending.id = RequestId("seed-request-002".to_owned());
    pending.status = RequestStatus::Pending;
    pending.submitted_at = Some(created);
    pending.due_at = Some(request_due_at(RequestPriority::Normal, created));
    requests.save(pending.clone()).await?;

    events
        .append(RequestEvent::new(
            pending.id.clone(),
            Some("demo-applicant"),
            EventKind::Submitted,
            "Request submitted",
            created,
        ))
        .await?;
    event_count += 1;

    // reserve the seed codes so the allocator keeps counting past them
    for (kind, code, sequence) in SEED_CODES.iter().copied() {
        sqlx::query(
            "INSERT INTO issued_code (kind, year, sequence, code, allocated_at)
             VALUES (?, 2024, ?, ?, ?)",
        )
        .bind(kind)
        .bind(sequence)
        .bind(code)
        .bind(created.to_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(SeedReport { requests: 2, authorizations: 1, events: event_count })
}

#[cfg(test)]
mod tests {
    use portgate_core::domain::authorization::VerificationToken;
    use portgate_core::domain::request::RequestId;

    use super::seed;
    use crate::repositories::{
        AuthorizationRepository, EventRepository, RequestRepository, SqlAuthorizationRepository,
        SqlEventRepository, SqlRequestRepository,
    };
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let first = seed(&pool).await.expect("first seed");
        let second = seed(&pool).await.expect("second seed");
        assert_eq!(first, second);

        let requests = SqlRequestRepository::new(pool.clone());
        let approved = requests
            .find_by_code("SOL-2024-901")
            .await
            .expect("find")
            .expect("seeded request exists");
        assert_eq!(approved.id, RequestId("seed-request-001".to_owned()));

        let authorization = SqlAuthorizationRepository::new(pool.clone())
            .find_by_token(&VerificationToken("seedtokenseedtokenseedtoken90000".to_owned()))
            .await
            .expect("find")
            .expect("seeded authorization exists");
        assert_eq!(authorization.code, "AUT-2024-901");

        let events = SqlEventRepository::new(pool)
            .list_for_request(&approved.id)
            .await
            .expect("events");
        assert_eq!(events.len(), 3);
    }
}
