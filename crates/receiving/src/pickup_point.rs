use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{Entity, PickupPointId};

use crate::kinds::closed_enum;

/// Cities a pickup point may be opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum City {
    #[serde(rename = "Москва")]
    Moscow,
    #[serde(rename = "Санкт-Петербург")]
    SaintPetersburg,
    #[serde(rename = "Казань")]
    Kazan,
}

closed_enum!(City, "city", {
    Moscow => "Москва",
    SaintPetersburg => "Санкт-Петербург",
    Kazan => "Казань",
});

/// A physical location where customers collect orders.
///
/// Created once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupPoint {
    pub id: PickupPointId,
    #[serde(rename = "registrationDate")]
    pub created_at: DateTime<Utc>,
    pub city: City,
}

impl PickupPoint {
    pub fn new(id: PickupPointId, city: City, created_at: DateTime<Utc>) -> Self {
        Self { id, created_at, city }
    }
}

impl Entity for PickupPoint {
    type Id = PickupPointId;

    fn id(&self) -> PickupPointId {
        self.id
    }
}
