//! Lifecycle store boundary.
//!
//! Mutations of reception/product state live behind [`LifecycleStore`]. Two
//! implementations share the same rules and error classification:
//! [`PostgresLifecycleStore`] (row-level locking inside transactions) and
//! [`InMemoryLifecycleStore`] (tests/dev).

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLifecycleStore;
pub use postgres::PostgresLifecycleStore;
pub use r#trait::{LifecycleError, LifecycleStore};
