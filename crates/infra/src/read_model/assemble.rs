//! In-memory stitching of the three history result sets.

use std::collections::HashMap;

use pvz_core::{Entity, PickupPointId, ReceptionId};
use pvz_receiving::{PickupPoint, PickupPointHistory, Product, Reception, ReceptionWithProducts};
use tracing::debug;

/// Nest `receptions` under `points` and `products` under `receptions`.
///
/// Input order is preserved at every level, so callers pass each list already
/// sorted. Every point gets a (possibly empty) reception list and every
/// reception a (possibly empty) product list. Children whose parent is not in
/// the input are dropped.
pub fn assemble(
    points: Vec<PickupPoint>,
    receptions: Vec<Reception>,
    products: Vec<Product>,
) -> Vec<PickupPointHistory> {
    let mut products_by_reception: HashMap<ReceptionId, Vec<Product>> =
        HashMap::with_capacity(receptions.len());
    for product in products {
        products_by_reception
            .entry(product.reception_id)
            .or_default()
            .push(product);
    }

    let mut history: Vec<PickupPointHistory> =
        points.into_iter().map(PickupPointHistory::empty).collect();
    let slot_by_point: HashMap<PickupPointId, usize> = history
        .iter()
        .enumerate()
        .map(|(idx, h)| (h.pickup_point.id(), idx))
        .collect();

    for reception in receptions {
        let Some(&slot) = slot_by_point.get(&reception.pvz_id) else {
            debug!(reception_id = %reception.id, "dropping reception of a pickup point outside the page");
            continue;
        };
        let products = products_by_reception
            .remove(&reception.id())
            .unwrap_or_default();
        history[slot].receptions.push(ReceptionWithProducts {
            reception,
            products,
        });
    }

    history
}
