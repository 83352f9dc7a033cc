//! `pvz-core` — identifiers, clocks and the error taxonomy shared by every
//! pickup point crate.
//!
//! This crate contains **no infrastructure** (no database, no HTTP).

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{PickupPointId, ProductId, ReceptionId};
