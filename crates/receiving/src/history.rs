//! Nested read-model shapes returned by history queries.

use serde::{Deserialize, Serialize};

use crate::{PickupPoint, Product, Reception};

/// A reception together with every product logged in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceptionWithProducts {
    pub reception: Reception,
    pub products: Vec<Product>,
}

impl ReceptionWithProducts {
    pub fn empty(reception: Reception) -> Self {
        Self {
            reception,
            products: Vec::new(),
        }
    }
}

/// A pickup point with the receptions that matched a history window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupPointHistory {
    #[serde(rename = "pvz")]
    pub pickup_point: PickupPoint,
    pub receptions: Vec<ReceptionWithProducts>,
}

impl PickupPointHistory {
    pub fn empty(pickup_point: PickupPoint) -> Self {
        Self {
            pickup_point,
            receptions: Vec::new(),
        }
    }
}
