use std::any::Any;
use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::Validate;

/// A persistable record type.
///
/// `KIND` is the explicit tag the unit of work caches repositories under.
/// Stores also use it as the table name, so it must be a plain identifier.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    /// Exposes the self-validation capability. Entities implementing
    /// [`Validate`] override this to return `Some(self)`.
    fn as_validatable(&self) -> Option<&dyn Validate> {
        None
    }
}

/// Type-erased view of a tracked entity.
pub(crate) trait Tracked: Send + Sync {
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
    fn as_validatable(&self) -> Option<&dyn Validate>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Entity> Tracked for T {
    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    fn as_validatable(&self) -> Option<&dyn Validate> {
        Entity::as_validatable(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Entity kinds known to the application, registered at startup.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    kinds: HashSet<&'static str>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Entity>(mut self) -> Self {
        self.kinds.insert(T::KIND);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.iter().copied()
    }
}
