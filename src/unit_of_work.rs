use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::Store;
use crate::{
    CommitObserver, DbContext, Entity, EntityRegistry, Executor, PersistenceContext, Repository,
    UnitOfWorkError, UnitOfWorkOptions, UnitOfWorkResult, ValidationErrors, ValidationPolicy,
};

/// Unit of Work pattern bounding one logical operation's persistence.
///
/// The UnitOfWork owns one persistence context, hands out at most one
/// repository per entity kind over it, and flushes every staged change in a
/// single save. The context is released on [`dispose`](Self::dispose) or on
/// drop, whichever happens first.
///
/// A UnitOfWork is meant for a single operation; `repository` and `dispose`
/// take `&mut self`, so it cannot be shared between concurrent callers.
pub struct UnitOfWork<C: PersistenceContext> {
    executor: Executor<C>,
    repositories: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
    registry: Option<Arc<EntityRegistry>>,
    observers: Vec<Arc<dyn CommitObserver>>,
    options: UnitOfWorkOptions,
    disposed: bool,
}

impl<C: PersistenceContext> UnitOfWork<C> {
    /// Takes ownership of an already-open context.
    pub fn new(context: C) -> Self {
        Self {
            executor: Executor::new(context),
            repositories: HashMap::new(),
            registry: None,
            observers: Vec::new(),
            options: UnitOfWorkOptions::default(),
            disposed: false,
        }
    }

    /// Restricts `repository` to the kinds in `registry`.
    pub fn with_registry(mut self, registry: Arc<EntityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_options(mut self, options: UnitOfWorkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &UnitOfWorkOptions {
        &self.options
    }

    pub fn executor(&self) -> &Executor<C> {
        &self.executor
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_live(&self) -> UnitOfWorkResult<()> {
        if self.disposed {
            tracing::error!("unit of work used after dispose");
            return Err(UnitOfWorkError::Disposed);
        }
        Ok(())
    }

    /// Returns the repository for `T`, creating it on first use.
    ///
    /// Every call for the same `T` returns the same instance.
    pub fn repository<T: Entity>(&mut self) -> UnitOfWorkResult<Arc<Repository<T, C>>> {
        self.ensure_live()?;

        if let Some(existing) = self.repositories.get(T::KIND) {
            return Arc::clone(existing)
                .downcast::<Repository<T, C>>()
                .map_err(|_| UnitOfWorkError::KindConflict(T::KIND));
        }

        if let Some(registry) = &self.registry {
            if !registry.contains(T::KIND) {
                return Err(UnitOfWorkError::UnregisteredEntity(T::KIND));
            }
        }

        let repository = Arc::new(Repository::<T, C>::new(self.executor.clone()));
        self.repositories
            .insert(T::KIND, Arc::clone(&repository) as Arc<dyn Any + Send + Sync>);
        tracing::debug!(kind = T::KIND, "created repository");
        Ok(repository)
    }

    /// Register a component that needs to be notified of commits.
    pub fn register_observer(&mut self, observer: Arc<dyn CommitObserver>) {
        self.observers.push(observer);
    }

    fn validate(context: &C) -> UnitOfWorkResult<()> {
        if let Some(errors) = ValidationErrors::collect(context.validatable_entries()) {
            tracing::warn!(failures = errors.len(), "pre-commit validation failed");
            return Err(errors.into());
        }
        Ok(())
    }

    fn notify_commit(&self, affected: u64) {
        for observer in &self.observers {
            observer.on_commit(affected);
        }
    }

    /// Writes every staged change, blocking until the store answers.
    ///
    /// Validation runs only under [`ValidationPolicy::Always`]. Fails with
    /// `Busy` rather than waiting if the context is in use.
    pub fn commit(&self) -> UnitOfWorkResult<u64> {
        self.ensure_live()?;
        let affected = {
            let mut context = self.executor.try_lock()?;
            if self.options.validation == ValidationPolicy::Always {
                Self::validate(&context)?;
            }
            context.save_changes()?
        };

        tracing::debug!(affected, "committed unit of work");
        self.notify_commit(affected);
        Ok(affected)
    }

    /// Validates every tracked entity, then writes every staged change.
    ///
    /// Any validation failure aborts before the store is touched.
    pub async fn commit_async(&self) -> UnitOfWorkResult<u64> {
        self.ensure_live()?;
        let affected = {
            let mut context = self.executor.lock().await?;
            Self::validate(&context)?;
            context.save_changes_async().await?
        };

        tracing::debug!(affected, "committed unit of work");
        self.notify_commit(affected);
        Ok(affected)
    }

    /// Drops every staged change without writing.
    pub async fn discard(&self) -> UnitOfWorkResult<()> {
        self.ensure_live()?;
        self.executor.lock().await?.tracker_mut().clear();

        for observer in &self.observers {
            observer.on_discard();
        }
        Ok(())
    }

    /// Releases the context. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.repositories.clear();
        self.observers.clear();

        if !self.executor.close() {
            tracing::warn!("context busy during dispose, releasing when the borrow ends");
        }
        tracing::debug!("unit of work disposed");
    }
}

impl<C: PersistenceContext> Drop for UnitOfWork<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Opens a fresh unit of work per logical operation over a shared store.
pub struct UnitOfWorkFactory<S: Store> {
    store: S,
    registry: Arc<EntityRegistry>,
    options: UnitOfWorkOptions,
}

impl<S: Store> UnitOfWorkFactory<S> {
    pub fn new(store: S, registry: EntityRegistry) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            options: UnitOfWorkOptions::default(),
        }
    }

    pub fn with_options(mut self, options: UnitOfWorkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Begin a new unit of work with its own context.
    pub fn begin(&self) -> UnitOfWork<DbContext<S::Session>> {
        UnitOfWork::new(DbContext::new(self.store.open_session()))
            .with_registry(Arc::clone(&self.registry))
            .with_options(self.options)
    }
}
