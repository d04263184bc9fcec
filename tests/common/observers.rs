use parking_lot::RwLock;
use std::sync::Arc;

use tracked_unit_of_work::CommitObserver;

/// Observer recording every notification for verification in tests
#[derive(Default)]
pub struct RecordingObserver {
    commits: RwLock<Vec<u64>>,
    discards: RwLock<usize>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commits(&self) -> Vec<u64> {
        self.commits.read().clone()
    }

    pub fn discards(&self) -> usize {
        *self.discards.read()
    }
}

impl CommitObserver for RecordingObserver {
    fn on_commit(&self, affected: u64) {
        self.commits.write().push(affected);
    }

    fn on_discard(&self) {
        *self.discards.write() += 1;
    }
}
