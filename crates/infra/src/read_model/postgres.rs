//! Postgres-backed history reader.
//!
//! Three queries instead of one join (which would fan pickup point rows out
//! per child and need de-duplication) or one query per pickup point (N+1):
//!
//! 1. the page of distinct pickup points with a reception in the window
//! 2. the in-window receptions of exactly those pickup points
//! 3. all products of exactly those receptions (no window filter)
//!
//! The results are stitched with [`assemble`].

use std::sync::Arc;

use sqlx::PgPool;
use tracing::{instrument, Span};
use uuid::Uuid;

use pvz_receiving::{PickupPoint, PickupPointHistory, Product, Reception};

use super::{HistoryQuery, HistoryWindow, PageRequest, assemble};
use crate::lifecycle_store::LifecycleError;
use crate::lifecycle_store::postgres::{
    PickupPointRow, ProductRow, ReceptionRow, decode, map_sqlx_error,
};

/// Non-locking history reader over the pickup point tables.
#[derive(Debug, Clone)]
pub struct PostgresHistoryReader {
    pool: Arc<PgPool>,
}

impl PostgresHistoryReader {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    #[instrument(
        skip(self),
        fields(
            start = %window.start,
            end = %window.end,
            page = page.page(),
            limit = page.limit(),
            pickup_points,
            receptions,
            products
        ),
        err
    )]
    pub async fn history(
        &self,
        window: HistoryWindow,
        page: PageRequest,
    ) -> Result<Vec<PickupPointHistory>, LifecycleError> {
        let span = Span::current();

        let points = self.page_of_pickup_points(window, page).await?;
        span.record("pickup_points", points.len());
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let point_ids: Vec<Uuid> = points.iter().map(|p| *p.id.as_uuid()).collect();
        let receptions = self.receptions_of(&point_ids, window).await?;
        span.record("receptions", receptions.len());

        let reception_ids: Vec<Uuid> = receptions.iter().map(|r| *r.id.as_uuid()).collect();
        let products = if reception_ids.is_empty() {
            Vec::new()
        } else {
            self.products_of(&reception_ids).await?
        };
        span.record("products", products.len());

        Ok(assemble(points, receptions, products))
    }

    async fn page_of_pickup_points(
        &self,
        window: HistoryWindow,
        page: PageRequest,
    ) -> Result<Vec<PickupPoint>, LifecycleError> {
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"
            SELECT DISTINCT p.id, p.created_at, p.city
            FROM pickup_points p
            JOIN receptions r ON r.pvz_id = p.id
            WHERE r.created_at >= $1 AND r.created_at <= $2
            ORDER BY p.created_at ASC, p.id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .bind(i64::from(page.limit()))
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_pickup_points", e))?;

        rows.iter()
            .map(|row| decode::<PickupPointRow, PickupPoint>("select_pickup_points", row))
            .collect()
    }

    async fn receptions_of(
        &self,
        point_ids: &[Uuid],
        window: HistoryWindow,
    ) -> Result<Vec<Reception>, LifecycleError> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_at, pvz_id, status
            FROM receptions
            WHERE pvz_id = ANY($1) AND created_at >= $2 AND created_at <= $3
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(point_ids)
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_receptions", e))?;

        rows.iter()
            .map(|row| decode::<ReceptionRow, Reception>("select_receptions", row))
            .collect()
    }

    async fn products_of(&self, reception_ids: &[Uuid]) -> Result<Vec<Product>, LifecycleError> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_at, product_type, reception_id
            FROM products
            WHERE reception_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(reception_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_products", e))?;

        rows.iter()
            .map(|row| decode::<ProductRow, Product>("select_products", row))
            .collect()
    }
}

#[async_trait::async_trait]
impl HistoryQuery for PostgresHistoryReader {
    async fn history(
        &self,
        window: HistoryWindow,
        page: PageRequest,
    ) -> Result<Vec<PickupPointHistory>, LifecycleError> {
        PostgresHistoryReader::history(self, window, page).await
    }
}
