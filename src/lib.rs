//! Tracked Unit of Work
//!
//! This crate bounds a logical operation's persistence work: a unit of work
//! owns one change-tracking context, hands out one repository per entity
//! kind over it, validates staged entities and commits them together.

pub mod change_tracker;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod executor;
pub mod observer;
pub mod paging;
pub mod repository;
pub mod response;
pub mod store;
pub mod unit_of_work;
pub mod validation;

pub use change_tracker::{ChangeTracker, EntryState, Pending};
pub use config::{DatabaseConfig, UnitOfWorkOptions, ValidationPolicy};
pub use context::{DbContext, PersistenceContext};
pub use entity::{Entity, EntityRegistry};
pub use error::{StoreError, StoreResult, UnitOfWorkError, UnitOfWorkResult};
pub use executor::{ContextGuard, Executor};
pub use observer::CommitObserver;
pub use paging::{PagedResult, PagingMetaData, PagingModel, SortDirection};
pub use repository::Repository;
pub use response::{BaseResponse, DynamicResponse, StatusResponse};
pub use store::{MemoryStore, PgStore, Store, StoreSession};
pub use unit_of_work::{UnitOfWork, UnitOfWorkFactory};
pub use validation::{Validate, ValidationErrors, ValidationFailure};
