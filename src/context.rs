use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::store::{RowPage, StoreSession};
use crate::{ChangeTracker, PagingModel, StoreError, StoreResult, Validate};

/// Persistence session a unit of work owns for its lifetime.
///
/// Repositories stage changes through `tracker_mut` and read through `find`
/// and `page`; the unit of work flushes them with one of the save methods.
#[async_trait]
pub trait PersistenceContext: Send + 'static {
    fn tracker(&self) -> &ChangeTracker;

    fn tracker_mut(&mut self) -> &mut ChangeTracker;

    /// Tracked entities that support self-validation, in tracker order.
    fn validatable_entries(&self) -> Vec<&dyn Validate> {
        self.tracker().validatable_entries()
    }

    /// Blocking flush of every staged change. Returns the affected row count.
    fn save_changes(&mut self) -> StoreResult<u64>;

    async fn save_changes_async(&mut self) -> StoreResult<u64>;

    async fn find(&mut self, kind: &'static str, id: Uuid) -> StoreResult<Option<Value>>;

    async fn page(&mut self, kind: &'static str, paging: &PagingModel) -> StoreResult<RowPage>;

    /// Releases the underlying session. Must be idempotent.
    fn dispose(&mut self);
}

/// Change-tracking context over a store session.
pub struct DbContext<S: StoreSession> {
    session: S,
    tracker: ChangeTracker,
    disposed: bool,
}

impl<S: StoreSession> DbContext<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            tracker: ChangeTracker::new(),
            disposed: false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.disposed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: StoreSession> PersistenceContext for DbContext<S> {
    fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    fn save_changes(&mut self) -> StoreResult<u64> {
        self.ensure_open()?;
        let changes = self.tracker.changes()?;
        if changes.is_empty() {
            return Ok(0);
        }
        let affected = self.session.apply(&changes)?;
        self.tracker.clear();
        Ok(affected)
    }

    async fn save_changes_async(&mut self) -> StoreResult<u64> {
        self.ensure_open()?;
        let changes = self.tracker.changes()?;
        if changes.is_empty() {
            return Ok(0);
        }
        let affected = self.session.apply_async(&changes).await?;
        self.tracker.clear();
        Ok(affected)
    }

    async fn find(&mut self, kind: &'static str, id: Uuid) -> StoreResult<Option<Value>> {
        self.ensure_open()?;
        self.session.fetch(kind, id).await
    }

    async fn page(&mut self, kind: &'static str, paging: &PagingModel) -> StoreResult<RowPage> {
        self.ensure_open()?;
        self.session.page(kind, paging).await
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.tracker.clear();
        self.session.close();
        tracing::debug!("persistence context disposed");
    }
}

impl<S: StoreSession> Drop for DbContext<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
