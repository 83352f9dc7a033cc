use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_core::{DomainError, Entity, PickupPointId, ReceptionId};

use crate::kinds::closed_enum;

/// Reception lifecycle: `InProgress → Closed`, and `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceptionStatus {
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "close")]
    Closed,
}

closed_enum!(ReceptionStatus, "reception status", {
    InProgress => "in_progress",
    Closed => "close",
});

/// One bounded intake session at a pickup point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reception {
    pub id: ReceptionId,
    #[serde(rename = "dateTime")]
    pub created_at: DateTime<Utc>,
    pub pvz_id: PickupPointId,
    pub status: ReceptionStatus,
}

impl Reception {
    /// A freshly opened reception. The only way into `InProgress`.
    pub fn open(id: ReceptionId, pvz_id: PickupPointId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            pvz_id,
            status: ReceptionStatus::InProgress,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == ReceptionStatus::InProgress
    }

    /// Close the reception, keeping its id, pickup point and creation time.
    pub fn close(self) -> Result<Self, DomainError> {
        if !self.is_in_progress() {
            return Err(DomainError::invariant(format!(
                "reception {} is already closed",
                self.id
            )));
        }
        Ok(Self {
            status: ReceptionStatus::Closed,
            ..self
        })
    }
}

impl Entity for Reception {
    type Id = ReceptionId;

    fn id(&self) -> ReceptionId {
        self.id
    }
}
