/// Trait for components that need to be notified when a unit of work
/// finishes a batch of changes.
///
/// Observers are registered on a [`UnitOfWork`](crate::UnitOfWork) and
/// called in registration order, after the store has accepted a commit or
/// after staged changes were discarded. Repositories keeping in-memory
/// state (caches, counters) use this to stay in step with the store.
pub trait CommitObserver: Send + Sync {
    /// Called after a successful commit with the number of affected rows.
    fn on_commit(&self, affected: u64);

    /// Called after staged changes were discarded without being written.
    fn on_discard(&self) {}
}
