use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{Entity, ProductId, ReceptionId};

use crate::kinds::closed_enum;

/// Kinds of item that can be logged during a reception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "электроника")]
    Electronics,
    #[serde(rename = "одежда")]
    Clothes,
    #[serde(rename = "обувь")]
    Shoes,
}

closed_enum!(ProductType, "product type", {
    Electronics => "электроника",
    Clothes => "одежда",
    Shoes => "обувь",
});

/// A single logged item belonging to one reception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    #[serde(rename = "dateTime")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub reception_id: ReceptionId,
}

impl Product {
    pub fn new(
        id: ProductId,
        reception_id: ReceptionId,
        product_type: ProductType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            created_at,
            product_type,
            reception_id,
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}
