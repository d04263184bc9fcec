use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::{PersistenceContext, UnitOfWorkError, UnitOfWorkResult};

/// Executor is the persistence context handle shared by a unit of work and
/// every repository it hands out.
///
/// Once closed, every access fails with [`UnitOfWorkError::Disposed`]. A
/// context that is borrowed at close time is released when that borrow ends.
pub struct Executor<C> {
    context: Arc<Mutex<Option<C>>>,
    closed: Arc<AtomicBool>,
}

impl<C> Clone for Executor<C> {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            closed: Arc::clone(&self.closed),
        }
    }
}

/// Exclusive borrow of a live context.
pub struct ContextGuard<'a, C: PersistenceContext> {
    slot: MutexGuard<'a, Option<C>>,
    closed: &'a AtomicBool,
}

impl<'a, C: PersistenceContext> ContextGuard<'a, C> {
    fn new(slot: MutexGuard<'a, Option<C>>, closed: &'a AtomicBool) -> UnitOfWorkResult<Self> {
        let guard = Self { slot, closed };
        if guard.slot.is_none() || closed.load(Ordering::SeqCst) {
            // dropping the guard releases a context left behind by close
            return Err(UnitOfWorkError::Disposed);
        }
        Ok(guard)
    }
}

impl<C: PersistenceContext> Deref for ContextGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        match self.slot.as_ref() {
            Some(context) => context,
            None => unreachable!("guards are only built over a live context"),
        }
    }
}

impl<C: PersistenceContext> DerefMut for ContextGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        match self.slot.as_mut() {
            Some(context) => context,
            None => unreachable!("guards are only built over a live context"),
        }
    }
}

impl<C: PersistenceContext> Drop for ContextGuard<'_, C> {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            if let Some(mut context) = self.slot.take() {
                context.dispose();
                tracing::debug!("context released after in-flight borrow");
            }
        }
    }
}

impl<C: PersistenceContext> Executor<C> {
    pub fn new(context: C) -> Self {
        Self {
            context: Arc::new(Mutex::new(Some(context))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Waits for the context.
    pub async fn lock(&self) -> UnitOfWorkResult<ContextGuard<'_, C>> {
        if self.is_closed() {
            return Err(UnitOfWorkError::Disposed);
        }
        let slot = self.context.lock().await;
        ContextGuard::new(slot, &self.closed)
    }

    /// Borrows the context without waiting; fails with `Busy` if it is held.
    pub fn try_lock(&self) -> UnitOfWorkResult<ContextGuard<'_, C>> {
        if self.is_closed() {
            return Err(UnitOfWorkError::Disposed);
        }
        let slot = self.context.try_lock().map_err(|_| UnitOfWorkError::Busy)?;
        ContextGuard::new(slot, &self.closed)
    }

    /// Closes the handle and disposes the context. Returns `false` when the
    /// context is borrowed; the borrower then disposes it on release.
    pub(crate) fn close(&self) -> bool {
        self.closed.store(true, Ordering::SeqCst);
        match self.context.try_lock() {
            Ok(mut slot) => {
                if let Some(mut context) = slot.take() {
                    context.dispose();
                }
                true
            }
            Err(_) => false,
        }
    }
}
