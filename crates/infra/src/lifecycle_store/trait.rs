use std::sync::Arc;

use thiserror::Error;

use pvz_core::{DomainError, ErrorKind, PickupPointId, ReceptionId};
use pvz_receiving::{City, PickupPoint, Product, ProductType, Reception};

/// Lifecycle store operation error.
///
/// Every variant maps onto one [`ErrorKind`]. Precondition failures carry the
/// id they were checked against; infrastructure failures carry the operation
/// name and the low-level message.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("pickup point not found: {0}")]
    PickupPointNotFound(PickupPointId),

    #[error("previous reception not closed for pickup point {0}")]
    ReceptionInProgress(PickupPointId),

    #[error("no active reception for pickup point {0}")]
    NoActiveReception(PickupPointId),

    #[error("no products in reception {0}")]
    NoProductsInReception(ReceptionId),

    #[error("failed to begin transaction: {0}")]
    TransactionStartFailed(String),

    #[error("failed to commit transaction: {0}")]
    TransactionCommitFailed(String),

    #[error("store unavailable in {operation}: {message}")]
    StoreUnavailable {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    Invariant(#[from] DomainError),
}

impl LifecycleError {
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            operation,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::PickupPointNotFound(_) => ErrorKind::NotFound,
            LifecycleError::ReceptionInProgress(_) => ErrorKind::Conflict,
            LifecycleError::NoActiveReception(_) => ErrorKind::NoActiveReception,
            LifecycleError::NoProductsInReception(_) => ErrorKind::NoProductsInReception,
            LifecycleError::TransactionStartFailed(_) => ErrorKind::TransactionStartFailed,
            LifecycleError::TransactionCommitFailed(_) => ErrorKind::TransactionCommitFailed,
            LifecycleError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            LifecycleError::Invariant(e) => e.kind(),
        }
    }
}

/// Transactional operations over pickup point / reception / product state.
///
/// ## State machine
///
/// Per pickup point the "current reception" slot moves `∅ → InProgress →
/// Closed`. `open_reception` is the only way into `InProgress` and requires
/// that no other reception of the point is in progress; `close_reception` is
/// the only way out. Products are appended to and removed (LIFO) from the
/// in-progress reception only.
///
/// ## Implementation requirements
///
/// - each operation is atomic: a failed precondition leaves no partial write
/// - operations on the same pickup point serialize; different pickup points
///   never block each other
/// - nothing is retried internally; retry is a caller concern
#[async_trait::async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Register a new pickup point.
    async fn create_pickup_point(&self, city: City) -> Result<PickupPoint, LifecycleError>;

    /// Open a reception at `pvz_id`.
    ///
    /// Fails with `PickupPointNotFound` for an unknown point and
    /// `ReceptionInProgress` when a reception is already open there.
    async fn open_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError>;

    /// Log a product in the in-progress reception of `pvz_id`.
    async fn append_product(
        &self,
        pvz_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, LifecycleError>;

    /// Remove the most recently logged product of the in-progress reception.
    async fn remove_last_product(&self, pvz_id: PickupPointId) -> Result<(), LifecycleError>;

    /// Close the in-progress reception of `pvz_id` and return it.
    async fn close_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError>;
}

#[async_trait::async_trait]
impl<S> LifecycleStore for Arc<S>
where
    S: LifecycleStore + ?Sized,
{
    async fn create_pickup_point(&self, city: City) -> Result<PickupPoint, LifecycleError> {
        (**self).create_pickup_point(city).await
    }

    async fn open_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError> {
        (**self).open_reception(pvz_id).await
    }

    async fn append_product(
        &self,
        pvz_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, LifecycleError> {
        (**self).append_product(pvz_id, product_type).await
    }

    async fn remove_last_product(&self, pvz_id: PickupPointId) -> Result<(), LifecycleError> {
        (**self).remove_last_product(pvz_id).await
    }

    async fn close_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError> {
        (**self).close_reception(pvz_id).await
    }
}
