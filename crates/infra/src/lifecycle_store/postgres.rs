//! Postgres-backed lifecycle store.
//!
//! Every mutating operation runs in one transaction and takes row-level locks
//! (`SELECT ... FOR UPDATE`) scoped to a single pickup point, so callers
//! touching the same point serialize while different points proceed in
//! parallel.
//!
//! ## Locking
//!
//! | Operation | Locks taken (in order) |
//! |-----------|------------------------|
//! | `open_reception` | pickup point row, then any in-progress reception row |
//! | `append_product` | in-progress reception row |
//! | `remove_last_product` | in-progress reception row, then its newest product row |
//! | `close_reception` | in-progress reception row |
//!
//! A concurrent caller blocked on one of these rows re-evaluates its `WHERE`
//! clause once the first transaction ends, so it observes the committed state
//! (a closed reception no longer matches `status = 'in_progress'`).
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LifecycleError | Scenario |
//! |------------|----------------------|----------------|----------|
//! | `begin()` failure | any | `TransactionStartFailed` | Pool exhausted, connection lost |
//! | `commit()` failure | any | `TransactionCommitFailed` | Serialization failure, connection lost |
//! | Database (unique violation) on reception insert | `23505` | `ReceptionInProgress` | Partial unique index caught a second open reception |
//! | Database (other) | any other | `StoreUnavailable` | Other database errors |
//! | PoolClosed / PoolTimedOut / Io / other | N/A | `StoreUnavailable` | Network errors, shutdown |
//!
//! ## Cancellation
//!
//! Dropping an in-flight operation drops its `Transaction`, which sqlx rolls
//! back when the connection returns to the pool. A transaction is never left
//! open.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use pvz_core::{Clock, DomainError, PickupPointId, ProductId, ReceptionId, SystemClock};
use pvz_receiving::{City, PickupPoint, Product, ProductType, Reception, ReceptionStatus};

use super::r#trait::{LifecycleError, LifecycleStore};

/// Postgres-backed lifecycle store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the store can be
/// shared across request handlers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PostgresLifecycleStore {
    pool: Arc<PgPool>,
    clock: Arc<dyn Clock>,
}

impl PostgresLifecycleStore {
    /// Create a store stamping records with the system clock.
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool: Arc::new(pool),
            clock,
        }
    }

    #[instrument(skip(self), fields(city = %city), err)]
    pub async fn create_pickup_point(&self, city: City) -> Result<PickupPoint, LifecycleError> {
        let point = PickupPoint::new(PickupPointId::new(), city, self.clock.now());

        sqlx::query("INSERT INTO pickup_points (id, created_at, city) VALUES ($1, $2, $3)")
            .bind(point.id.as_uuid())
            .bind(point.created_at)
            .bind(point.city.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_pickup_point", e))?;

        Ok(point)
    }

    #[instrument(skip(self), fields(pvz_id = %pvz_id), err)]
    pub async fn open_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError> {
        let mut tx = self.begin("open_reception").await?;
        let result = self.open_in(&mut tx, pvz_id).await;
        finish(tx, "open_reception", result).await
    }

    #[instrument(skip(self), fields(pvz_id = %pvz_id, product_type = %product_type), err)]
    pub async fn append_product(
        &self,
        pvz_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, LifecycleError> {
        let mut tx = self.begin("append_product").await?;
        let result = self.append_in(&mut tx, pvz_id, product_type).await;
        finish(tx, "append_product", result).await
    }

    #[instrument(skip(self), fields(pvz_id = %pvz_id), err)]
    pub async fn remove_last_product(&self, pvz_id: PickupPointId) -> Result<(), LifecycleError> {
        let mut tx = self.begin("remove_last_product").await?;
        let result = remove_in(&mut tx, pvz_id).await;
        finish(tx, "remove_last_product", result).await
    }

    #[instrument(skip(self), fields(pvz_id = %pvz_id), err)]
    pub async fn close_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError> {
        let mut tx = self.begin("close_reception").await?;
        let result = close_in(&mut tx, pvz_id).await;
        finish(tx, "close_reception", result).await
    }

    async fn begin(&self, operation: &'static str) -> Result<Transaction<'static, Postgres>, LifecycleError> {
        self.pool.begin().await.map_err(|e| {
            warn!(operation, error = %e, "failed to begin transaction");
            LifecycleError::TransactionStartFailed(format!("{operation}: {e}"))
        })
    }

    async fn open_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pvz_id: PickupPointId,
    ) -> Result<Reception, LifecycleError> {
        // Locking the pickup point row serializes concurrent openers: a
        // FOR UPDATE over zero receptions would lock nothing.
        let point = sqlx::query("SELECT id FROM pickup_points WHERE id = $1 FOR UPDATE")
            .bind(pvz_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("lock_pickup_point", e))?;
        if point.is_none() {
            return Err(LifecycleError::PickupPointNotFound(pvz_id));
        }

        if let Some(active) = lock_active_reception(tx, pvz_id).await? {
            debug!(reception_id = %active.id, "reception already in progress");
            return Err(LifecycleError::ReceptionInProgress(pvz_id));
        }

        let reception = Reception::open(ReceptionId::new(), pvz_id, self.clock.now());
        sqlx::query(
            r#"
            INSERT INTO receptions (id, created_at, pvz_id, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reception.id.as_uuid())
        .bind(reception.created_at)
        .bind(pvz_id.as_uuid())
        .bind(reception.status.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LifecycleError::ReceptionInProgress(pvz_id)
            } else {
                map_sqlx_error("insert_reception", e)
            }
        })?;

        Ok(reception)
    }

    async fn append_in(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        pvz_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, LifecycleError> {
        let reception = require_active_reception(tx, pvz_id).await?;

        // Stamped after the lock is held, so creation order matches commit order.
        let product = Product::new(ProductId::new(), reception.id, product_type, self.clock.now());
        sqlx::query(
            r#"
            INSERT INTO products (id, created_at, product_type, reception_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(product.created_at)
        .bind(product.product_type.as_str())
        .bind(reception.id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(product)
    }
}

async fn remove_in(
    tx: &mut Transaction<'_, Postgres>,
    pvz_id: PickupPointId,
) -> Result<(), LifecycleError> {
    let reception = require_active_reception(tx, pvz_id).await?;

    let last = sqlx::query(
        r#"
        SELECT id
        FROM products
        WHERE reception_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(reception.id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_last_product", e))?;

    let Some(row) = last else {
        return Err(LifecycleError::NoProductsInReception(reception.id));
    };
    let product_id: Uuid = row
        .try_get("id")
        .map_err(|e| map_sqlx_error("lock_last_product", e))?;

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("delete_product", e))?;

    debug!(reception_id = %reception.id, product_id = %product_id, "removed last product");
    Ok(())
}

async fn close_in(
    tx: &mut Transaction<'_, Postgres>,
    pvz_id: PickupPointId,
) -> Result<Reception, LifecycleError> {
    let closed = require_active_reception(tx, pvz_id).await?.close()?;

    sqlx::query("UPDATE receptions SET status = $1 WHERE id = $2")
        .bind(closed.status.as_str())
        .bind(closed.id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("close_reception", e))?;

    Ok(closed)
}

/// Locate and lock the current in-progress reception of a pickup point.
///
/// Every operation that acts on "the current reception" goes through here, so
/// they all contend on the same row and serialize per pickup point.
async fn lock_active_reception(
    tx: &mut Transaction<'_, Postgres>,
    pvz_id: PickupPointId,
) -> Result<Option<Reception>, LifecycleError> {
    let row = sqlx::query(
        r#"
        SELECT id, created_at, pvz_id, status
        FROM receptions
        WHERE pvz_id = $1 AND status = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(pvz_id.as_uuid())
    .bind(ReceptionStatus::InProgress.as_str())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_active_reception", e))?;

    row.map(|row| decode::<ReceptionRow, Reception>("lock_active_reception", &row))
        .transpose()
}

async fn require_active_reception(
    tx: &mut Transaction<'_, Postgres>,
    pvz_id: PickupPointId,
) -> Result<Reception, LifecycleError> {
    lock_active_reception(tx, pvz_id)
        .await?
        .ok_or(LifecycleError::NoActiveReception(pvz_id))
}

/// Commit on success, roll back on any error.
async fn finish<T>(
    tx: Transaction<'static, Postgres>,
    operation: &'static str,
    result: Result<T, LifecycleError>,
) -> Result<T, LifecycleError> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                warn!(operation, error = %e, "failed to commit transaction");
                LifecycleError::TransactionCommitFailed(format!("{operation}: {e}"))
            })?;
            Ok(value)
        }
        Err(err) => {
            if let Err(e) = tx.rollback().await {
                // The connection is discarded by the pool; the server aborts the transaction.
                warn!(operation, error = %e, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Map SQLx errors to `LifecycleError::StoreUnavailable`.
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> LifecycleError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            LifecycleError::unavailable(
                operation,
                format!("database error [{code}]: {}", db_err.message()),
            )
        }
        sqlx::Error::PoolClosed => LifecycleError::unavailable(operation, "connection pool closed"),
        sqlx::Error::PoolTimedOut => {
            LifecycleError::unavailable(operation, "timed out waiting for a connection")
        }
        other => LifecycleError::unavailable(operation, format!("sqlx error: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

/// Decode a row through its raw row type into a domain record.
pub(crate) fn decode<'r, R, T>(operation: &'static str, row: &'r PgRow) -> Result<T, LifecycleError>
where
    R: sqlx::FromRow<'r, PgRow>,
    T: TryFrom<R, Error = DomainError>,
{
    let raw = R::from_row(row).map_err(|e| map_sqlx_error(operation, e))?;
    T::try_from(raw).map_err(|e| corrupt_row(operation, e))
}

/// A stored value no longer parses into the domain type.
fn corrupt_row(operation: &'static str, err: DomainError) -> LifecycleError {
    LifecycleError::unavailable(operation, format!("corrupt row: {err}"))
}

// SQLx row types

#[derive(Debug)]
pub(crate) struct PickupPointRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    city: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for PickupPointRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(PickupPointRow {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            city: row.try_get("city")?,
        })
    }
}

impl TryFrom<PickupPointRow> for PickupPoint {
    type Error = DomainError;

    fn try_from(row: PickupPointRow) -> Result<Self, Self::Error> {
        Ok(PickupPoint::new(
            PickupPointId::from_uuid(row.id),
            row.city.parse()?,
            row.created_at,
        ))
    }
}

#[derive(Debug)]
pub(crate) struct ReceptionRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    pvz_id: Uuid,
    status: String,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ReceptionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ReceptionRow {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            pvz_id: row.try_get("pvz_id")?,
            status: row.try_get("status")?,
        })
    }
}

impl TryFrom<ReceptionRow> for Reception {
    type Error = DomainError;

    fn try_from(row: ReceptionRow) -> Result<Self, Self::Error> {
        Ok(Reception {
            id: ReceptionId::from_uuid(row.id),
            created_at: row.created_at,
            pvz_id: PickupPointId::from_uuid(row.pvz_id),
            status: row.status.parse()?,
        })
    }
}

#[derive(Debug)]
pub(crate) struct ProductRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    product_type: String,
    reception_id: Uuid,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            product_type: row.try_get("product_type")?,
            reception_id: row.try_get("reception_id")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = DomainError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product::new(
            ProductId::from_uuid(row.id),
            ReceptionId::from_uuid(row.reception_id),
            row.product_type.parse()?,
            row.created_at,
        ))
    }
}

// Implement LifecycleStore trait

#[async_trait::async_trait]
impl LifecycleStore for PostgresLifecycleStore {
    async fn create_pickup_point(&self, city: City) -> Result<PickupPoint, LifecycleError> {
        PostgresLifecycleStore::create_pickup_point(self, city).await
    }

    async fn open_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError> {
        PostgresLifecycleStore::open_reception(self, pvz_id).await
    }

    async fn append_product(
        &self,
        pvz_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, LifecycleError> {
        PostgresLifecycleStore::append_product(self, pvz_id, product_type).await
    }

    async fn remove_last_product(&self, pvz_id: PickupPointId) -> Result<(), LifecycleError> {
        PostgresLifecycleStore::remove_last_product(self, pvz_id).await
    }

    async fn close_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError> {
        PostgresLifecycleStore::close_reception(self, pvz_id).await
    }
}
