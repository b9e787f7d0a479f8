use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use portgate_core::codes::{format_code, CodeKind, MAX_PROBES};

use super::{CodeAllocator, RepositoryError};
use crate::DbPool;

/// Durable allocator backed by the `issued_code` table.
///
/// The probe-and-increment shape is kept from the pure allocator, but every
/// candidate is claimed with an INSERT against `UNIQUE(kind, year, sequence)`:
/// when two writers race for the same sequence, exactly one commit wins and
/// the loser probes upward, so duplicates are impossible.
pub struct SqlCodeAllocator {
    pool: DbPool,
}

impl SqlCodeAllocator {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CodeAllocator for SqlCodeAllocator {
    async fn allocate(&self, kind: CodeKind, year: i32) -> Result<String, RepositoryError> {
        let highest: Option<i64> = sqlx::query(
            "SELECT MAX(sequence) AS highest FROM issued_code WHERE kind = ? AND year = ?",
        )
        .bind(kind.as_str())
        .bind(year)
        .fetch_one(&self.pool)
        .await?
        .try_get("highest")
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        let mut sequence = highest.map_or(1, |highest| highest.max(0) as u32 + 1);

        for _ in 0..MAX_PROBES {
            let code = format_code(kind, year, sequence);
            let claimed = sqlx::query(
                "INSERT INTO issued_code (kind, year, sequence, code, allocated_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(kind.as_str())
            .bind(year)
            .bind(i64::from(sequence))
            .bind(&code)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await;

            match claimed {
                Ok(_) => return Ok(code),
                Err(error) => {
                    let unique_violation = error
                        .as_database_error()
                        .map(|db_error| db_error.is_unique_violation())
                        .unwrap_or(false);
                    if !unique_violation {
                        return Err(error.into());
                    }
                    sequence += 1;
                }
            }
        }

        Err(RepositoryError::CodeSpaceExhausted { kind: kind.as_str(), year })
    }
}
