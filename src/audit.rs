//! Audit log of settled workflows.
//!
//! Every workflow that reaches a terminal state is appended as one JSON
//! line, so a day of dashboard usage can be reconstructed after the fact.
//! Logging failures are reported but never fail the workflow itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::warn;

use crate::pending::TxHash;

/// One settled workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub label: String,
    pub tx_hash: Option<String>,
    /// Terminal state: `confirmed`, `reverted`, `rejected` or `failed`.
    pub outcome: String,
    pub error: Option<String>,
}

impl AuditRecord {
    /// Append this record to a file, creating parent directories if needed.
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

/// Handle the orchestrator writes through. Disabled means drop everything.
#[derive(Debug, Clone)]
pub struct AuditLog {
    enabled: bool,
    path: String,
}

impl AuditLog {
    pub fn new(enabled: bool, path: impl Into<String>) -> Self {
        Self {
            enabled,
            path: path.into(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: String::new(),
        }
    }

    pub fn record(
        &self,
        action_type: &str,
        label: &str,
        tx_hash: Option<TxHash>,
        outcome: &str,
        error: Option<String>,
    ) {
        if !self.enabled {
            return;
        }

        let record = AuditRecord {
            timestamp: Utc::now(),
            action_type: action_type.to_string(),
            label: label.to_string(),
            tx_hash: tx_hash.map(|h| format!("{:?}", h)),
            outcome: outcome.to_string(),
            error,
        };

        if let Err(e) = record.append_to_file(&self.path) {
            warn!("Failed to append audit record: {}", e);
        }
    }
}

// ============================================
// TESTS
// ============================================
