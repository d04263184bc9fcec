//! Backing stores the change-tracking context writes to.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{PagingModel, StoreResult};

pub mod memory;
pub mod postgres;

pub use memory::{MemorySession, MemoryStore};
pub use postgres::{PgSession, PgStore};

/// Store-level operation for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    Insert(Value),
    Update(Value),
    Delete,
}

/// One staged row change, keyed by entity kind and id.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: &'static str,
    pub id: Uuid,
    pub op: ChangeOp,
}

/// Rows of one page plus the total row count of the unpaged query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowPage {
    pub rows: Vec<Value>,
    pub total: u64,
}

/// Shared store from which each persistence context opens its own session.
pub trait Store: Send + Sync + 'static {
    type Session: StoreSession;

    fn open_session(&self) -> Self::Session;
}

/// Per-context access to the store.
///
/// A change-set passed to `apply` or `apply_async` is written atomically:
/// either every change lands or none does.
#[async_trait]
pub trait StoreSession: Send + 'static {
    /// Blocking write of a change-set. Returns the number of affected rows.
    fn apply(&mut self, changes: &[Change]) -> StoreResult<u64>;

    async fn apply_async(&mut self, changes: &[Change]) -> StoreResult<u64>;

    async fn fetch(&mut self, kind: &'static str, id: Uuid) -> StoreResult<Option<Value>>;

    async fn page(&mut self, kind: &'static str, paging: &PagingModel) -> StoreResult<RowPage>;

    /// Releases the session's resources. Later calls are no-ops.
    fn close(&mut self);
}
