//! Pickup point receiving domain.
//!
//! Pickup points, the receptions (intake sessions) opened at them and the
//! products logged within a reception. Pure data and state transitions: no IO,
//! no HTTP, no storage.

mod kinds;
pub mod history;
pub mod pickup_point;
pub mod product;
pub mod reception;

pub use history::{PickupPointHistory, ReceptionWithProducts};
pub use pickup_point::{City, PickupPoint};
pub use product::{Product, ProductType};
pub use reception::{Reception, ReceptionStatus};
