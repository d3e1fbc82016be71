// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Offline bookkeeping queue.
//
// Every successful print appends a record of what was printed.  The physical
// print already happened, so the record must reach the server eventually:
// entries stay queued, in order, until a drain gets a 2xx for them.  Drains
// run when connectivity comes back; only one drain runs at a time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use labelpress_core::error::{LabelpressError, Result};
use labelpress_core::types::{
    EntryId, OfflineQueueEntry, PrintContext, PrintLabel, PrintRecord, PrintRecordPayload,
};

use crate::lock;
use crate::remote::{BookkeepingClient, is_success};
use crate::store::QueueStore;

/// What one drain achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub submitted: usize,
    pub remaining: usize,
}

/// Ordered queue of bookkeeping calls awaiting submission.
///
/// Multi-writer (any print appends), single-drainer.  When a store is wired
/// in, every append and removal is written through to it.
pub struct OfflineQueue {
    entries: Mutex<VecDeque<OfflineQueueEntry>>,
    online: AtomicBool,
    draining: AtomicBool,
    store: Option<Arc<dyn QueueStore>>,
}

impl Default for OfflineQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineQueue {
    /// In-memory queue, assumed online.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            online: AtomicBool::new(true),
            draining: AtomicBool::new(false),
            store: None,
        }
    }

    /// Queue backed by `store`, preloaded with whatever it already holds.
    pub fn with_store(store: Arc<dyn QueueStore>) -> Result<Self> {
        let entries = store.load()?;
        if !entries.is_empty() {
            info!(count = entries.len(), "restored offline bookkeeping entries");
        }
        Ok(Self {
            entries: Mutex::new(entries.into()),
            store: Some(store),
            ..Self::new()
        })
    }

    pub fn enqueue(&self, entry: OfflineQueueEntry) {
        if let Some(store) = &self.store {
            if let Err(e) = store.append(&entry) {
                warn!(entry_id = %entry.id, error = %e, "failed to persist offline entry");
            }
        }
        debug!(entry_id = %entry.id, labels = entry.params.labels.len(), "bookkeeping entry queued");
        lock(&self.entries).push_back(entry);
    }

    /// Queue one bookkeeping entry covering `labels`.  Nothing is queued for
    /// an empty list.
    pub fn record_prints(
        &self,
        context: &PrintContext,
        labels: &[PrintLabel],
        printed_at: DateTime<Utc>,
    ) -> Option<EntryId> {
        if labels.is_empty() {
            return None;
        }
        let payload = PrintRecordPayload {
            customer_id: context.customer_id,
            location_id: context.location_id,
            user_id: context.user_id,
            labels: labels
                .iter()
                .map(|label| PrintRecord::from_label(label, printed_at))
                .collect(),
        };
        let entry = OfflineQueueEntry::print_labels(payload);
        let id = entry.id;
        self.enqueue(entry);
        Some(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Snapshot of the queued entries, oldest first.
    pub fn entries(&self) -> Vec<OfflineQueueEntry> {
        lock(&self.entries).iter().cloned().collect()
    }

    /// Record connectivity.  Returns `true` on the offline → online edge,
    /// which is when the caller should drain.
    pub fn set_online(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        match (was_online, online) {
            (false, true) => {
                info!(queued = self.len(), "connectivity restored");
                true
            }
            (true, false) => {
                warn!("connectivity lost");
                false
            }
            _ => false,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// User-facing status line while records are held back.
    pub fn status_message(&self) -> Option<String> {
        let count = self.len();
        if count > 0 && !self.is_online() {
            Some(format!(
                "You're offline. {} print {} will be sent automatically when you reconnect.",
                count,
                if count == 1 { "record" } else { "records" },
            ))
        } else {
            None
        }
    }

    /// Submit every queued entry once, in order.
    ///
    /// Entries are removed only after a 2xx.  Failed entries stay where they
    /// were.  Losing connectivity mid-drain stops further submissions.
    pub async fn drain(&self, client: &dyn BookkeepingClient) -> Result<DrainReport> {
        if self.draining.swap(true, Ordering::SeqCst) {
            return Err(LabelpressError::AlreadyDraining);
        }
        let _guard = DrainGuard(&self.draining);

        let snapshot = self.entries();
        let mut submitted = 0;
        for entry in snapshot {
            if !self.is_online() {
                info!("connectivity lost; drain stopped");
                break;
            }
            match client.record_prints(&entry.params).await {
                Ok(status) if is_success(status) => {
                    self.remove(&entry.id);
                    submitted += 1;
                }
                Ok(status) => {
                    warn!(entry_id = %entry.id, status, "bookkeeping submission rejected; kept");
                }
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "bookkeeping submission failed; kept");
                }
            }
        }

        let report = DrainReport {
            submitted,
            remaining: self.len(),
        };
        info!(
            submitted = report.submitted,
            remaining = report.remaining,
            "offline queue drained"
        );
        Ok(report)
    }

    fn remove(&self, id: &EntryId) {
        lock(&self.entries).retain(|entry| entry.id != *id);
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(id) {
                warn!(entry_id = %id, error = %e, "failed to remove persisted offline entry");
            }
        }
    }
}

/// Clears the draining flag however the drain ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
