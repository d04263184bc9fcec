use std::marker::PhantomData;

use uuid::Uuid;

use crate::change_tracker::Pending;
use crate::{
    Entity, Executor, PagedResult, PagingMetaData, PagingModel, PersistenceContext, StoreError,
    UnitOfWorkResult,
};

/// Typed view of the shared persistence context for entity kind `T`.
///
/// Changes staged here are held by the context until the owning unit of
/// work commits them.
pub struct Repository<T, C> {
    executor: Executor<C>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, C: PersistenceContext> Repository<T, C> {
    pub(crate) fn new(executor: Executor<C>) -> Self {
        Self {
            executor,
            _entity: PhantomData,
        }
    }

    pub fn kind(&self) -> &'static str {
        T::KIND
    }

    /// Stages a new entity for insertion.
    pub async fn add(&self, entity: T) -> UnitOfWorkResult<()> {
        self.executor.lock().await?.tracker_mut().add(entity);
        Ok(())
    }

    pub async fn add_range(&self, entities: impl IntoIterator<Item = T>) -> UnitOfWorkResult<()> {
        let mut context = self.executor.lock().await?;
        let tracker = context.tracker_mut();
        for entity in entities {
            tracker.add(entity);
        }
        Ok(())
    }

    /// Stages new state for an existing entity.
    pub async fn update(&self, entity: T) -> UnitOfWorkResult<()> {
        self.executor.lock().await?.tracker_mut().update(entity);
        Ok(())
    }

    /// Stages removal by key. Removing an entity that was only added and
    /// never committed simply forgets it.
    pub async fn remove(&self, id: Uuid) -> UnitOfWorkResult<()> {
        self.executor.lock().await?.tracker_mut().remove(T::KIND, id);
        Ok(())
    }

    /// Looks up an entity, preferring staged state over the store.
    pub async fn find(&self, id: Uuid) -> UnitOfWorkResult<Option<T>> {
        let mut context = self.executor.lock().await?;
        match context.tracker().get::<T>(id) {
            Some(Pending::Staged(entity)) => return Ok(Some(entity)),
            Some(Pending::Deleted) => return Ok(None),
            None => {}
        }

        let row = context.find(T::KIND, id).await?;
        let entity: Option<T> = row
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)?;
        Ok(entity)
    }

    /// Reads one page of committed rows. `meta_data.total` counts every
    /// committed row of this kind, not just the returned page.
    pub async fn list(&self, paging: &PagingModel) -> UnitOfWorkResult<PagedResult<T>> {
        let page = self.executor.lock().await?.page(T::KIND, paging).await?;
        let items = page
            .rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(StoreError::from)?;

        Ok(PagedResult {
            items,
            meta_data: PagingMetaData::new(paging, page.total),
        })
    }

    /// Number of staged, uncommitted changes for this kind.
    pub async fn pending(&self) -> UnitOfWorkResult<usize> {
        Ok(self.executor.lock().await?.tracker().pending(T::KIND))
    }
}
