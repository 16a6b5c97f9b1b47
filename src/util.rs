use crate::error::AnalysisError;
use crate::model::Location;
use anyhow::Result;
use std::time::{Duration, Instant};

/// Cooperative per-request time budget. Checked at traversal yield points;
/// expiry surfaces a timeout error instead of leaving a traversal running.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget_ms: u64,
}

impl Deadline {
    pub fn after_ms(budget_ms: u64) -> Self {
        Deadline {
            started: Instant::now(),
            budget_ms,
        }
    }

    pub fn expired(&self) -> bool {
        self.started.elapsed() >= Duration::from_millis(self.budget_ms)
    }

    pub fn check(&self) -> Result<()> {
        if self.expired() {
            Err(AnalysisError::Timeout(self.budget_ms).into())
        } else {
            Ok(())
        }
    }
}

/// Deterministic order for location lists: file, then line, then column.
pub fn sort_locations(locations: &mut [Location]) {
    locations.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.column.cmp(&b.column))
    });
}
