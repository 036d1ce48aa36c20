//! Audit log.
//!
//! A durable, append-only record of notable inspection actions. Entries
//! outlive the workflow session and are never mutated after insertion.
//!
//! - [`AuditStore`] owns the file on disk and assigns identifiers
//! - [`AuditTrail`] is the fire-and-forget front the workflow steps use;
//!   a failed write is logged and never fails the step that caused it

mod store;
mod trail;

pub use store::AuditStore;
pub use trail::AuditTrail;

use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store-assigned audit entry identifier.
pub type AuditId = u64;

/// Action-type tags written by the workflow steps.
pub mod actions {
    pub const REGULATION_SUMMARY_GENERATED: &str = "REGULATION_SUMMARY_GENERATED";
    pub const REGULATION_QUESTION_ANSWERED: &str = "REGULATION_QUESTION_ANSWERED";
    pub const CHECKLIST_UPDATED: &str = "CHECKLIST_UPDATED";
    pub const IMAGE_RISK_ANALYZED: &str = "IMAGE_RISK_ANALYZED";
    pub const IMAGE_ANALYSIS_APPENDED_TO_NOTES: &str = "IMAGE_ANALYSIS_APPENDED_TO_NOTES";
    pub const CONTRACTOR_PLAN_ANALYZED: &str = "CONTRACTOR_PLAN_ANALYZED";
    pub const SAFETY_REPORT_GENERATED: &str = "SAFETY_REPORT_GENERATED";
    pub const URGENT_EMAIL_DRAFTED: &str = "URGENT_EMAIL_DRAFTED";
    pub const FILE_CONTENT_EXTRACTED: &str = "FILE_CONTENT_EXTRACTED";
}

/// Audit store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Error opening audit log {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audit log {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error("Error writing audit log {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error encoding audit log: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A persisted audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: AuditId,
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// An audit entry before the store has assigned its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    pub details: Map<String, Value>,
}

impl NewAuditEntry {
    /// Create an entry at an arbitrary instant.
    ///
    /// The timestamp is coerced to UTC with millisecond precision, the
    /// canonical form stored on disk.
    pub fn new<Tz: TimeZone>(action_type: impl Into<String>, timestamp: DateTime<Tz>) -> Self {
        Self {
            timestamp: canonical_timestamp(&timestamp),
            action_type: action_type.into(),
            details: Map::new(),
        }
    }

    /// Create an entry stamped with the current time.
    pub fn now(action_type: impl Into<String>) -> Self {
        Self::new(action_type, Utc::now())
    }

    /// Add one detail field.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    fn into_entry(self, id: AuditId) -> AuditLogEntry {
        AuditLogEntry {
            id,
            timestamp: self.timestamp,
            action_type: self.action_type,
            details: self.details,
        }
    }
}

/// UTC, truncated to milliseconds.
pub fn canonical_timestamp<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> DateTime<Utc> {
    timestamp.with_timezone(&Utc).trunc_subsecs(3)
}
