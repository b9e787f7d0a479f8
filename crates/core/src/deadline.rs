//! Priority to SLA mapping. Due times are data, not enforcement: breaching
//! one makes an item "overdue" but triggers nothing by itself.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    Normal,
    High,
    Critical,
    Vip,
}

impl RequestPriority {
    pub fn sla_hours(&self) -> u32 {
        match self {
            Self::Vip => 1,
            Self::Critical => 2,
            Self::High => 8,
            Self::Normal => 24,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Vip => "vip",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl EscalationPriority {
    pub fn sla_hours(&self) -> u32 {
        match self {
            Self::Critical => 1,
            Self::High => 4,
            Self::Medium => 12,
            Self::Low => 24,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

pub fn request_due_at(priority: RequestPriority, reference: DateTime<Utc>) -> DateTime<Utc> {
    reference + Duration::hours(i64::from(priority.sla_hours()))
}

pub fn escalation_due_at(priority: EscalationPriority, reference: DateTime<Utc>) -> DateTime<Utc> {
    reference + Duration::hours(i64::from(priority.sla_hours()))
}
