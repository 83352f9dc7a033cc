use std::sync::{Arc, RwLock};

use pvz_core::{Clock, PickupPointId, ProductId, ReceptionId, SystemClock};
use pvz_receiving::{
    City, PickupPoint, PickupPointHistory, Product, ProductType, Reception,
};

use super::r#trait::{LifecycleError, LifecycleStore};
use crate::read_model::{HistoryQuery, HistoryWindow, PageRequest, assemble};

/// The three tables, in insertion order.
#[derive(Debug, Default)]
struct Tables {
    pickup_points: Vec<PickupPoint>,
    receptions: Vec<Reception>,
    products: Vec<Product>,
}

impl Tables {
    fn active_reception_index(&self, pvz_id: PickupPointId) -> Option<usize> {
        self.receptions
            .iter()
            .rposition(|r| r.pvz_id == pvz_id && r.is_in_progress())
    }
}

/// In-memory lifecycle store.
///
/// Intended for tests/dev. Every operation runs under one write lock, which
/// makes it atomic and trivially serialized (coarser than the per-pickup-point
/// locking of the Postgres store, with the same observable results).
#[derive(Debug)]
pub struct InMemoryLifecycleStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryLifecycleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLifecycleStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of in-progress receptions at a pickup point (0 or 1).
    pub fn in_progress_count(&self, pvz_id: PickupPointId) -> Result<usize, LifecycleError> {
        let tables = self.read("in_progress_count")?;
        Ok(tables
            .receptions
            .iter()
            .filter(|r| r.pvz_id == pvz_id && r.is_in_progress())
            .count())
    }

    /// Products of a reception, oldest first.
    pub fn products_of(&self, reception_id: ReceptionId) -> Result<Vec<Product>, LifecycleError> {
        let tables = self.read("products_of")?;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.reception_id == reception_id)
            .cloned()
            .collect())
    }

    fn read(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::RwLockReadGuard<'_, Tables>, LifecycleError> {
        self.tables
            .read()
            .map_err(|_| LifecycleError::unavailable(operation, "lock poisoned"))
    }

    fn write(
        &self,
        operation: &'static str,
    ) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, LifecycleError> {
        self.tables
            .write()
            .map_err(|_| LifecycleError::unavailable(operation, "lock poisoned"))
    }
}

#[async_trait::async_trait]
impl LifecycleStore for InMemoryLifecycleStore {
    async fn create_pickup_point(&self, city: City) -> Result<PickupPoint, LifecycleError> {
        let mut tables = self.write("create_pickup_point")?;
        let point = PickupPoint::new(PickupPointId::new(), city, self.clock.now());
        tables.pickup_points.push(point.clone());
        Ok(point)
    }

    async fn open_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError> {
        let mut tables = self.write("open_reception")?;

        if !tables.pickup_points.iter().any(|p| p.id == pvz_id) {
            return Err(LifecycleError::PickupPointNotFound(pvz_id));
        }
        if tables.active_reception_index(pvz_id).is_some() {
            return Err(LifecycleError::ReceptionInProgress(pvz_id));
        }

        let reception = Reception::open(ReceptionId::new(), pvz_id, self.clock.now());
        tables.receptions.push(reception.clone());
        Ok(reception)
    }

    async fn append_product(
        &self,
        pvz_id: PickupPointId,
        product_type: ProductType,
    ) -> Result<Product, LifecycleError> {
        let mut tables = self.write("append_product")?;

        let idx = tables
            .active_reception_index(pvz_id)
            .ok_or(LifecycleError::NoActiveReception(pvz_id))?;
        let reception_id = tables.receptions[idx].id;

        let product = Product::new(ProductId::new(), reception_id, product_type, self.clock.now());
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn remove_last_product(&self, pvz_id: PickupPointId) -> Result<(), LifecycleError> {
        let mut tables = self.write("remove_last_product")?;

        let idx = tables
            .active_reception_index(pvz_id)
            .ok_or(LifecycleError::NoActiveReception(pvz_id))?;
        let reception_id = tables.receptions[idx].id;

        let last = tables
            .products
            .iter()
            .rposition(|p| p.reception_id == reception_id)
            .ok_or(LifecycleError::NoProductsInReception(reception_id))?;
        tables.products.remove(last);
        Ok(())
    }

    async fn close_reception(&self, pvz_id: PickupPointId) -> Result<Reception, LifecycleError> {
        let mut tables = self.write("close_reception")?;

        let idx = tables
            .active_reception_index(pvz_id)
            .ok_or(LifecycleError::NoActiveReception(pvz_id))?;
        let closed = tables.receptions[idx].clone().close()?;
        tables.receptions[idx] = closed.clone();
        Ok(closed)
    }
}

#[async_trait::async_trait]
impl HistoryQuery for InMemoryLifecycleStore {
    async fn history(
        &self,
        window: HistoryWindow,
        page: PageRequest,
    ) -> Result<Vec<PickupPointHistory>, LifecycleError> {
        let tables = self.read("history")?;

        let mut points: Vec<PickupPoint> = tables
            .pickup_points
            .iter()
            .filter(|p| {
                tables
                    .receptions
                    .iter()
                    .any(|r| r.pvz_id == p.id && window.contains(r.created_at))
            })
            .cloned()
            .collect();
        // Stable sort: insertion order breaks creation-time ties.
        points.sort_by_key(|p| p.created_at);
        let points: Vec<PickupPoint> = points
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let mut receptions: Vec<Reception> = tables
            .receptions
            .iter()
            .filter(|r| points.iter().any(|p| p.id == r.pvz_id) && window.contains(r.created_at))
            .cloned()
            .collect();
        receptions.sort_by_key(|r| r.created_at);

        let products: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| receptions.iter().any(|r| r.id == p.reception_id))
            .cloned()
            .collect();

        Ok(assemble(points, receptions, products))
    }
}
