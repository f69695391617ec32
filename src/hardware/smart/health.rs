//! Health Scoring
//!
//! Deterministic mapping of a device's degradation counters to a 0-100
//! health percentage.

use crate::domain::ports::SmartStatus;

/// Penalty per reallocated sector
pub const REALLOCATED_PENALTY: u64 = 2;
/// Penalty per pending sector
pub const PENDING_PENALTY: u64 = 3;
/// Penalty per uncorrectable error
pub const UNCORRECTABLE_PENALTY: u64 = 5;
/// Flat penalty for a failed SMART self-assessment
pub const FAILED_STATUS_PENALTY: u64 = 50;

/// Counters an ATA health score is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCounters {
    pub reallocated_sectors: u64,
    pub pending_sectors: u64,
    pub uncorrectable_errors: u64,
    pub status: SmartStatus,
}

/// What a health score is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthBasis {
    /// ATA penalty model
    Counters(HealthCounters),
    /// NVMe vendor wear metric, authoritative on its own
    Wear { percentage_used: u32 },
}

/// Health percentage in `0..=100`
pub fn health_percent(basis: &HealthBasis) -> u8 {
    match basis {
        HealthBasis::Counters(counters) => counter_health(counters),
        HealthBasis::Wear { percentage_used } => wear_health(*percentage_used),
    }
}

fn counter_health(c: &HealthCounters) -> u8 {
    let mut penalty = c
        .reallocated_sectors
        .saturating_mul(REALLOCATED_PENALTY)
        .saturating_add(c.pending_sectors.saturating_mul(PENDING_PENALTY))
        .saturating_add(c.uncorrectable_errors.saturating_mul(UNCORRECTABLE_PENALTY));

    if c.status == SmartStatus::Failed {
        penalty = penalty.saturating_add(FAILED_STATUS_PENALTY);
    }

    100u64.saturating_sub(penalty) as u8
}

fn wear_health(percentage_used: u32) -> u8 {
    100u32.saturating_sub(percentage_used) as u8
}
