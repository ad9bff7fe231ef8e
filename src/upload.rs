//! Per-file bookkeeping for a batch of concurrent image uploads.
//!
//! The controller issues every upload at once and settles them one by one as
//! their events come back. Join semantics are wait-all with fail-fast: the
//! first failed slot sinks the whole batch, and settlements that arrive for
//! an abandoned batch are ignored by comparing batch ids.

use serde::{Deserialize, Serialize};

use crate::capabilities::{StorageError, StorageKey};
use crate::event::{BatchId, DownloadUrl, FileHandle, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    InFlight,
    Done(DownloadUrl),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSlot {
    pub key: StorageKey,
    pub file: FileHandle,
    pub state: SlotState,
    pub transferred_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// Aggregate state of a batch. `Complete` carries the download URLs in the
/// same order the files were selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Pending,
    Failed,
    Complete(Vec<DownloadUrl>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadBatch {
    id: BatchId,
    slots: Vec<UploadSlot>,
}

impl UploadBatch {
    /// Derive one storage key per file, preserving selection order. Fails
    /// only if a file name produces an unusable key.
    pub fn plan(owner: &UserId, files: &[FileHandle]) -> Result<Self, StorageError> {
        let slots = files
            .iter()
            .map(|file| {
                Ok(UploadSlot {
                    key: StorageKey::for_upload(owner, &file.file_name)?,
                    file: file.clone(),
                    state: SlotState::InFlight,
                    transferred_bytes: 0,
                    total_bytes: file.size_bytes,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(Self {
            id: BatchId::generate(),
            slots,
        })
    }

    #[must_use]
    pub fn id(&self) -> &BatchId {
        &self.id
    }

    #[must_use]
    pub fn slots(&self) -> &[UploadSlot] {
        &self.slots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Byte counters from the shell. Out-of-bounds indices and settled slots
    /// are ignored; progress has no control-flow significance.
    pub fn record_progress(&mut self, index: usize, transferred_bytes: u64, total_bytes: u64) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.state == SlotState::InFlight {
                slot.transferred_bytes = transferred_bytes;
                slot.total_bytes = Some(total_bytes);
            }
        }
    }

    /// Record a terminal result for one slot. Returns false for indices out
    /// of range or slots that already settled.
    pub fn settle(&mut self, index: usize, result: Result<DownloadUrl, ()>) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        if slot.state != SlotState::InFlight {
            return false;
        }
        slot.state = match result {
            Ok(url) => SlotState::Done(url),
            Err(()) => SlotState::Failed,
        };
        true
    }

    #[must_use]
    pub fn outcome(&self) -> BatchOutcome {
        if self.slots.iter().any(|s| s.state == SlotState::Failed) {
            return BatchOutcome::Failed;
        }
        let mut urls = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            match &slot.state {
                SlotState::Done(url) => urls.push(url.clone()),
                SlotState::InFlight => return BatchOutcome::Pending,
                SlotState::Failed => unreachable!("failed slots are handled above"),
            }
        }
        BatchOutcome::Complete(urls)
    }

    #[must_use]
    pub fn settled_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state != SlotState::InFlight)
            .count()
    }

    /// Fraction of total bytes transferred, when every slot reported a
    /// total; otherwise falls back to the settled-slot ratio.
    #[must_use]
    pub fn progress_fraction(&self) -> f64 {
        if self.slots.is_empty() {
            return 1.0;
        }
        let totals: Option<u64> = self.slots.iter().map(|s| s.total_bytes).sum();
        match totals {
            Some(total) if total > 0 => {
                let transferred: u64 = self
                    .slots
                    .iter()
                    .map(|s| match &s.state {
                        SlotState::Done(_) => s.total_bytes.unwrap_or(s.transferred_bytes),
                        _ => s.transferred_bytes,
                    })
                    .sum();
                (transferred as f64 / total as f64).clamp(0.0, 1.0)
            }
            _ => self.settled_count() as f64 / self.slots.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> FileHandle {
        FileHandle {
            uri: format!("file:///photos/{name}"),
            file_name: name.to_string(),
            size_bytes: Some(size),
        }
    }

    fn url(n: usize) -> DownloadUrl {
        DownloadUrl::new(format!("https://storage.example.com/o/images%2Fimg{n}")).unwrap()
    }

    fn owner() -> UserId {
        UserId::new("uid42")
    }

    #[test]
    fn plan_keeps_selection_order() {
        let files = vec![file("a.jpg", 100), file("b.jpg", 200), file("c.jpg", 300)];
        let batch = UploadBatch::plan(&owner(), &files).unwrap();
        assert_eq!(batch.len(), 3);
        for (slot, f) in batch.slots().iter().zip(&files) {
            assert_eq!(slot.file, *f);
            assert!(slot.key.as_str().contains(&f.file_name));
        }
    }

    #[test]
    fn outcome_preserves_order_under_out_of_order_settlement() {
        let files = vec![file("a.jpg", 1), file("b.jpg", 1), file("c.jpg", 1)];
        let mut batch = UploadBatch::plan(&owner(), &files).unwrap();
        assert!(batch.settle(2, Ok(url(2))));
        assert!(batch.settle(0, Ok(url(0))));
        assert_eq!(batch.outcome(), BatchOutcome::Pending);
        assert!(batch.settle(1, Ok(url(1))));
        assert_eq!(
            batch.outcome(),
            BatchOutcome::Complete(vec![url(0), url(1), url(2)])
        );
    }

    #[test]
    fn one_failure_fails_the_batch() {
        let files = vec![file("a.jpg", 1), file("b.jpg", 1)];
        let mut batch = UploadBatch::plan(&owner(), &files).unwrap();
        assert!(batch.settle(0, Ok(url(0))));
        assert!(batch.settle(1, Err(())));
        assert_eq!(batch.outcome(), BatchOutcome::Failed);
    }

    #[test]
    fn settle_rejects_out_of_range_and_double_settlement() {
        let files = vec![file("a.jpg", 1)];
        let mut batch = UploadBatch::plan(&owner(), &files).unwrap();
        assert!(!batch.settle(5, Ok(url(0))));
        assert!(batch.settle(0, Ok(url(0))));
        assert!(!batch.settle(0, Err(())));
        assert_eq!(batch.outcome(), BatchOutcome::Complete(vec![url(0)]));
    }

    #[test]
    fn progress_ignores_settled_and_out_of_range_slots() {
        let files = vec![file("a.jpg", 100), file("b.jpg", 100)];
        let mut batch = UploadBatch::plan(&owner(), &files).unwrap();
        batch.record_progress(0, 50, 100);
        batch.record_progress(9, 50, 100);
        assert!((batch.progress_fraction() - 0.25).abs() < 1e-9);
        batch.settle(0, Ok(url(0)));
        batch.record_progress(0, 70, 100);
        assert!((batch.progress_fraction() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn progress_falls_back_to_settled_ratio_without_totals() {
        let mut no_size = file("a.jpg", 0);
        no_size.size_bytes = None;
        let files = vec![no_size, file("b.jpg", 100)];
        let mut batch = UploadBatch::plan(&owner(), &files).unwrap();
        assert!((batch.progress_fraction() - 0.0).abs() < 1e-9);
        batch.settle(0, Ok(url(0)));
        assert!((batch.progress_fraction() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn empty_batch_is_complete() {
        let batch = UploadBatch::plan(&owner(), &[]).unwrap();
        assert_eq!(batch.outcome(), BatchOutcome::Complete(vec![]));
    }
}
