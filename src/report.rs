//! Run summary reporting
//!
//! Aggregates pipeline outcomes into a status→count table plus a capped
//! list of error records. This is the contract the presentation layer and
//! the process exit code depend on.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ScrubOutcome, ScrubStatus};

/// Errors reported in detail; the rest only contribute to the counts.
pub const MAX_REPORTED_ERRORS: usize = 50;

/// One reportable error record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub src: PathBuf,
    pub scrubber: Option<String>,
    pub message: String,
}

/// Aggregated results of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: String,
    pub counts: BTreeMap<ScrubStatus, usize>,
    pub errors: Vec<ErrorRecord>,
    pub total_errors: usize,
}

impl RunReport {
    pub fn from_outcomes(outcomes: &[ScrubOutcome]) -> Self {
        let mut counts: BTreeMap<ScrubStatus, usize> = BTreeMap::new();
        for outcome in outcomes {
            *counts.entry(outcome.status).or_insert(0) += 1;
        }

        let error_outcomes: Vec<&ScrubOutcome> = outcomes
            .iter()
            .filter(|o| o.status == ScrubStatus::Error)
            .collect();
        let total_errors = error_outcomes.len();

        let errors = error_outcomes
            .into_iter()
            .take(MAX_REPORTED_ERRORS)
            .map(|o| ErrorRecord {
                src: o.src.clone(),
                scrubber: o.scrubber.clone(),
                message: o.message.clone().unwrap_or_default(),
            })
            .collect();

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            counts,
            errors,
            total_errors,
        }
    }

    pub fn count(&self, status: ScrubStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }
}
