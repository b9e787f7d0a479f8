//! Human-readable sequential codes, one sequence per entity kind per year.
//!
//! Allocation finds the highest issued sequence, increments, then probes
//! upward past any code that already exists. The probe guards against gaps
//! left by concurrent or out-of-order creation; persistent allocators close
//! the remaining race with a unique constraint and retry (see portgate-db).

use std::collections::HashSet;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Upper bound on the defensive probe. Exhausting it means the code space
/// for a kind/year is corrupt, which is fatal.
pub const MAX_PROBES: u32 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    Request,
    Authorization,
    Escalation,
    Extension,
    Discrepancy,
}

impl CodeKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Request => "SOL",
            Self::Authorization => "AUT",
            Self::Escalation => "ESC",
            Self::Extension => "EXT",
            Self::Discrepancy => "DISC",
        }
    }

    /// Minimum zero-padded width of the sequence component.
    pub fn sequence_width(&self) -> usize {
        match self {
            Self::Extension => 4,
            _ => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Authorization => "authorization",
            Self::Escalation => "escalation",
            Self::Extension => "extension",
            Self::Discrepancy => "discrepancy",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "request" => Some(Self::Request),
            "authorization" => Some(Self::Authorization),
            "escalation" => Some(Self::Escalation),
            "extension" => Some(Self::Extension),
            "discrepancy" => Some(Self::Discrepancy),
            _ => None,
        }
    }
}

pub fn format_code(kind: CodeKind, year: i32, sequence: u32) -> String {
    format!("{}-{}-{:0width$}", kind.prefix(), year, sequence, width = kind.sequence_width())
}

/// Extracts the sequence number from a code of the given kind/year.
/// Returns `None` when the code belongs to another kind or year.
pub fn parse_sequence(kind: CodeKind, year: i32, code: &str) -> Option<u32> {
    let prefix = format!("{}-{}-", kind.prefix(), year);
    code.strip_prefix(&prefix)?.parse().ok()
}

/// Lookup over already-issued codes, scoped to one kind/year sequence.
pub trait IssuedCodes {
    fn highest_sequence(&self, kind: CodeKind, year: i32) -> Option<u32>;
    fn contains(&self, kind: CodeKind, year: i32, sequence: u32) -> bool;
}

pub fn allocate(
    issued: &dyn IssuedCodes,
    kind: CodeKind,
    year: i32,
) -> Result<String, DomainError> {
    let mut sequence = issued.highest_sequence(kind, year).map_or(1, |highest| highest + 1);
    for _ in 0..MAX_PROBES {
        if !issued.contains(kind, year, sequence) {
            return Ok(format_code(kind, year, sequence));
        }
        sequence += 1;
    }
    Err(DomainError::CodeSpaceExhausted { kind, year })
}

#[derive(Default)]
pub struct InMemoryIssuedCodes {
    issued: Mutex<HashSet<(CodeKind, i32, u32)>>,
}

impl InMemoryIssuedCodes {
    pub fn record(&self, kind: CodeKind, year: i32, sequence: u32) {
        let mut issued = match self.issued.lock() {
            Ok(issued) => issued,
            Err(poisoned) => poisoned.into_inner(),
        };
        issued.insert((kind, year, sequence));
    }

    /// Allocates and records in one step, for tests and in-memory wiring.
    pub fn allocate_and_record(&self, kind: CodeKind, year: i32) -> Result<String, DomainError> {
        let code = allocate(self, kind, year)?;
        let sequence = parse_sequence(kind, year, &code)
            .ok_or_else(|| DomainError::Invariant(format!("unparseable allocated code {code}")))?;
        self.record(kind, year, sequence);
        Ok(code)
    }
}

impl IssuedCodes for InMemoryIssuedCodes {
    fn highest_sequence(&self, kind: CodeKind, year: i32) -> Option<u32> {
        let issued = match self.issued.lock() {
            Ok(issued) => issued,
            Err(poisoned) => poisoned.into_inner(),
        };
        issued
            .iter()
            .filter(|(issued_kind, issued_year, _)| *issued_kind == kind && *issued_year == year)
            .map(|(_, _, sequence)| *sequence)
            .max()
    }

    fn contains(&self, kind: CodeKind, year: i32, sequence: u32) -> bool {
        let issued = match self.issued.lock() {
            Ok(issued) => issued,
            Err(poisoned) => poisoned.into_inner(),
        };
        issued.contains(&(kind, year, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::{allocate, format_code, parse_sequence, CodeKind, InMemoryIssuedCodes, MAX_PROBES};
    use crate::errors::DomainError;

    #[test]
    fn codes_match_the_published_formats() {
        assert_eq!(format_code(CodeKind::Request, 2024, 1), "SOL-2024-001");
        assert_eq!(format_code(CodeKind::Authorization, 2024, 42), "AUT-2024-042");
        assert_eq!(format_code(CodeKind::Escalation, 2025, 7), "ESC-2025-007");
        assert_eq!(format_code(CodeKind::Extension, 2024, 12), "EXT-2024-0012");
        assert_eq!(format_code(CodeKind::Discrepancy, 2024, 3), "DISC-2024-003");
    }

    #[test]
    fn sequences_widen_past_the_padded_range() {
        assert_eq!(format_code(CodeKind::Request, 2024, 1234), "SOL-2024-1234");
    }

    #[test]
    fn parse_sequence_round_trips_and_rejects_foreign_codes() {
        assert_eq!(parse_sequence(CodeKind::Request, 2024, "SOL-2024-017"), Some(17));
        assert_eq!(parse_sequence(CodeKind::Request, 2024, "AUT-2024-017"), None);
        assert_eq!(parse_sequence(CodeKind::Request, 2023, "SOL-2024-017"), None);
    }

    #[test]
    fn first_allocation_starts_each_year_at_one() {
        let issued = InMemoryIssuedCodes::default();
        let code = allocate(&issued, CodeKind::Request, 2024).expect("allocate");
        assert_eq!(code, "SOL-2024-001");
    }

    #[test]
    fn allocation_continues_after_the_highest_issued_sequence() {
        let issued = InMemoryIssuedCodes::default();
        issued.record(CodeKind::Request, 2024, 41);
        let code = allocate(&issued, CodeKind::Request, 2024).expect("allocate");
        assert_eq!(code, "SOL-2024-042");
    }

    #[test]
    fn sequences_are_independent_per_kind_and_year() {
        let issued = InMemoryIssuedCodes::default();
        issued.record(CodeKind::Request, 2024, 9);
        assert_eq!(allocate(&issued, CodeKind::Escalation, 2024).unwrap(), "ESC-2024-001");
        assert_eq!(allocate(&issued, CodeKind::Request, 2025).unwrap(), "SOL-2025-001");
    }

    #[test]
    fn probe_steps_past_codes_created_out_of_order() {
        let issued = InMemoryIssuedCodes::default();
        issued.record(CodeKind::Request, 2024, 3);
        issued.record(CodeKind::Request, 2024, 4);
        // highest is 4, 5 is free
        assert_eq!(allocate(&issued, CodeKind::Request, 2024).unwrap(), "SOL-2024-005");
    }

    #[test]
    fn repeated_allocation_never_duplicates() {
        let issued = InMemoryIssuedCodes::default();
        let first = issued.allocate_and_record(CodeKind::Extension, 2024).unwrap();
        let second = issued.allocate_and_record(CodeKind::Extension, 2024).unwrap();
        assert_eq!(first, "EXT-2024-0001");
        assert_eq!(second, "EXT-2024-0002");
    }

    #[test]
    fn exhausted_probe_window_is_a_fatal_error() {
        let issued = InMemoryIssuedCodes::default();
        for sequence in 1..=MAX_PROBES {
            issued.record(CodeKind::Discrepancy, 2024, sequence);
        }
        let error = allocate(&issued, CodeKind::Discrepancy, 2024).expect_err("must exhaust");
        assert_eq!(error, DomainError::CodeSpaceExhausted { kind: CodeKind::Discrepancy, year: 2024 });
        assert!(error.is_fatal());
    }
}
