//! Infrastructure layer: persistence for pickup points, receptions and
//! products, plus the history read model.

pub mod config;
pub mod db;
pub mod lifecycle_store;
pub mod read_model;

pub use config::DatabaseConfig;
pub use lifecycle_store::{
    InMemoryLifecycleStore, LifecycleError, LifecycleStore, PostgresLifecycleStore,
};
pub use read_model::{HistoryQuery, HistoryWindow, PageRequest, PostgresHistoryReader};
