// Client-side buffer of index updates awaiting a batched flush.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::index::{IndexRecord, TileHeader};

pub const DEFAULT_WRITE_QUEUE_THRESHOLD: usize = 10;

/// One staged metadata update for a tile written into a locked blob.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PendingWriteUpdate {
    pub platefile_id: i32,
    pub header: TileHeader,
    pub record: IndexRecord,
}

/// FIFO of pending updates. Insertion order is flush order.
#[derive(Debug)]
pub struct WriteQueue {
    pending: VecDeque<PendingWriteUpdate>,
    threshold: usize,
}

impl WriteQueue {
    pub fn new(threshold: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(threshold),
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Appends an update and reports whether the queue is now due for a flush.
    pub fn push(&mut self, update: PendingWriteUpdate) -> bool {
        self.pending.push_back(update);
        self.pending.len() >= self.threshold
    }

    pub fn drain(&mut self) -> Vec<PendingWriteUpdate> {
        self.pending.drain(..).collect()
    }

    /// Puts a drained batch back ahead of anything queued since, keeping order.
    pub fn restore(&mut self, batch: Vec<PendingWriteUpdate>) {
        for update in batch.into_iter().rev() {
            self.pending.push_front(update);
        }
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new(DEFAULT_WRITE_QUEUE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_WRITE_QUEUE_THRESHOLD, PendingWriteUpdate, WriteQueue};
    use crate::core::index::{IndexRecord, TileCoordinate, TileHeader, TransactionId};

    fn update(col: u32) -> PendingWriteUpdate {
        PendingWriteUpdate {
            platefile_id: 1,
            header: TileHeader::new(TileCoordinate::new(col, 0, 4), TransactionId(2), "png"),
            record: IndexRecord::new(5, u64::from(col) * 100, 100),
        }
    }

    #[test]
    fn push_reports_threshold() {
        let mut queue = WriteQueue::default();
        for col in 0..(DEFAULT_WRITE_QUEUE_THRESHOLD as u32 - 1) {
            assert!(!queue.push(update(col)));
        }
        assert!(queue.push(update(99)));
        assert_eq!(queue.len(), DEFAULT_WRITE_QUEUE_THRESHOLD);
    }

    #[test]
    fn drain_preserves_insertion_order() {
        let mut queue = WriteQueue::new(4);
        for col in 0..3 {
            queue.push(update(col));
        }
        let cols: Vec<u32> = queue.drain().iter().map(|u| u.header.col).collect();
        assert_eq!(cols, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn restore_puts_batch_ahead_of_newer_entries() {
        let mut queue = WriteQueue::new(8);
        queue.push(update(0));
        queue.push(update(1));
        let batch = queue.drain();
        queue.push(update(2));
        queue.restore(batch);
        let cols: Vec<u32> = queue.drain().iter().map(|u| u.header.col).collect();
        assert_eq!(cols, vec![0, 1, 2]);
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let mut queue = WriteQueue::new(0);
        assert_eq!(queue.threshold(), 1);
        assert!(queue.push(update(0)));
    }
}
