//! Fire-and-forget audit recording.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::{AuditStore, NewAuditEntry};

/// Best-effort audit side channel.
///
/// `record` spawns the write and returns immediately. Failures are only
/// reported through `tracing`; callers never see them.
#[derive(Clone, Default)]
pub struct AuditTrail {
    store: Option<Arc<AuditStore>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("store", &self.store.as_ref().map(|s| s.path().to_path_buf()))
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl AuditTrail {
    pub fn new(store: Arc<AuditStore>) -> Self {
        Self { store: Some(store), pending: Arc::default() }
    }

    /// A trail that drops every entry.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Queue an entry. Must be called from within a tokio runtime.
    pub fn record(&self, entry: NewAuditEntry) {
        let Some(store) = self.store.clone() else {
            tracing::debug!(action = %entry.action_type, "Audit trail disabled, entry dropped");
            return;
        };

        let handle = tokio::spawn(async move {
            let action = entry.action_type.clone();
            if let Err(e) = store.add_entry(entry).await {
                tracing::warn!(action = %action, error = %e, "Failed to write audit log entry");
            }
        });

        let mut pending = self.pending.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for queued writes. Used before process exit.
    pub async fn flush(&self) {
        let handles = std::mem::take(&mut *self.pending.lock());
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Audit task did not complete");
            }
        }
    }
}
