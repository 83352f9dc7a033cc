//! Lifecycle and history against a real Postgres.
//!
//! Runs only when `DATABASE_URL` is set; otherwise every test returns early.
//! Each test stamps its records at a random instant so runs sharing one
//! database do not see each other's history.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pvz_core::{ErrorKind, ManualClock, PickupPointId, ReceptionId};
use pvz_infra::db::{bootstrap_schema, connect};
use pvz_infra::{
    DatabaseConfig, HistoryWindow, LifecycleError, LifecycleStore, PageRequest,
    PostgresHistoryReader, PostgresLifecycleStore,
};
use pvz_receiving::{City, ProductType, ReceptionStatus};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

static SCHEMA_READY: OnceCell<()> = OnceCell::const_new();

struct Harness {
    pool: PgPool,
    store: Arc<PostgresLifecycleStore>,
    reader: PostgresHistoryReader,
    clock: Arc<ManualClock>,
    base: DateTime<Utc>,
}

impl Harness {
    fn window(&self) -> HistoryWindow {
        HistoryWindow::new(self.base, self.base + Duration::hours(1))
    }

    fn tick(&self) {
        self.clock.advance(Duration::seconds(1));
    }

    async fn count(&self, sql: &str, id: Uuid) -> i64 {
        sqlx::query_scalar(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .expect("count query")
    }

    async fn in_progress_count(&self, pvz_id: PickupPointId) -> i64 {
        self.count(
            "SELECT COUNT(*) FROM receptions WHERE pvz_id = $1 AND status = 'in_progress'",
            *pvz_id.as_uuid(),
        )
        .await
    }

    async fn product_count(&self, reception_id: ReceptionId) -> i64 {
        self.count(
            "SELECT COUNT(*) FROM products WHERE reception_id = $1",
            *reception_id.as_uuid(),
        )
        .await
    }
}

async fn harness() -> Option<Harness> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL not set; skipping postgres test");
        return None;
    }
    let config = DatabaseConfig::from_env().expect("database config");
    let pool: PgPool = connect(&config).await.expect("connect to postgres");
    SCHEMA_READY
        .get_or_try_init(|| bootstrap_schema(&pool))
        .await
        .expect("bootstrap schema");

    // Random instant in 1990..2120 keeps concurrent runs apart.
    let salt = (Uuid::now_v7().as_u128() & 0xFFFF_FFFF) as i64;
    let base = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(salt);
    let clock = Arc::new(ManualClock::new(base + Duration::minutes(1)));

    Some(Harness {
        pool: pool.clone(),
        store: Arc::new(PostgresLifecycleStore::with_clock(pool.clone(), clock.clone())),
        reader: PostgresHistoryReader::new(pool),
        clock,
        base,
    })
}

#[tokio::test]
async fn kazan_shoes_reception_round_trip() {
    let Some(h) = harness().await else { return };

    let point = h.store.create_pickup_point(City::Kazan).await.unwrap();
    h.tick();
    let reception = h.store.open_reception(point.id).await.unwrap();
    h.tick();
    let first = h.store.append_product(point.id, ProductType::Shoes).await.unwrap();
    h.tick();
    let second = h.store.append_product(point.id, ProductType::Shoes).await.unwrap();
    h.tick();
    let closed = h.store.close_reception(point.id).await.unwrap();
    assert_eq!(closed.id, reception.id);
    assert_eq!(closed.status, ReceptionStatus::Closed);

    let err = h
        .store
        .append_product(point.id, ProductType::Shoes)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NoActiveReception(id) if id == point.id));

    let history = h
        .reader
        .history(h.window(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].pickup_point, point);
    assert_eq!(history[0].receptions.len(), 1);
    let entry = &history[0].receptions[0];
    assert_eq!(entry.reception, closed);
    assert_eq!(entry.products, vec![first, second]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_opens_admit_exactly_one() {
    let Some(h) = harness().await else { return };
    let point = h.store.create_pickup_point(City::Moscow).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = h.store.clone();
        let pvz_id = point.id;
        handles.push(tokio::spawn(async move { store.open_reception(pvz_id).await }));
    }

    let mut opened = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => opened += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::Conflict, "{err}"),
        }
    }
    assert_eq!(opened, 1);
}

#[tokio::test]
async fn second_open_conflicts_until_close() {
    let Some(h) = harness().await else { return };
    let point = h.store.create_pickup_point(City::SaintPetersburg).await.unwrap();

    h.store.open_reception(point.id).await.unwrap();
    let err = h.store.open_reception(point.id).await.unwrap_err();
    assert!(matches!(err, LifecycleError::ReceptionInProgress(_)));

    h.store.close_reception(point.id).await.unwrap();
    h.tick();
    h.store.open_reception(point.id).await.unwrap();
}

#[tokio::test]
async fn remove_last_product_is_lifo() {
    let Some(h) = harness().await else { return };
    let point = h.store.create_pickup_point(City::Moscow).await.unwrap();
    let reception = h.store.open_reception(point.id).await.unwrap();

    let err = h.store.remove_last_product(point.id).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NoProductsInReception(id) if id == reception.id));

    // Same timestamp for all three: ordering must still follow append order.
    let a = h.store.append_product(point.id, ProductType::Electronics).await.unwrap();
    let b = h.store.append_product(point.id, ProductType::Clothes).await.unwrap();
    h.store.append_product(point.id, ProductType::Shoes).await.unwrap();

    h.store.remove_last_product(point.id).await.unwrap();
    h.store.close_reception(point.id).await.unwrap();

    let history = h
        .reader
        .history(h.window(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(history[0].receptions[0].products, vec![a, b]);
}

#[tokio::test]
async fn unknown_pickup_point_is_not_found() {
    let Some(h) = harness().await else { return };
    let missing = PickupPointId::new();

    let err = h.store.open_reception(missing).await.unwrap_err();
    assert!(matches!(err, LifecycleError::PickupPointNotFound(id) if id == missing));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = h.store.close_reception(missing).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NoActiveReception(_)));
}

#[tokio::test]
async fn history_pages_pickup_points_by_creation_time() {
    let Some(h) = harness().await else { return };

    let mut points = Vec::new();
    for _ in 0..3 {
        let point = h.store.create_pickup_point(City::Kazan).await.unwrap();
        h.store.open_reception(point.id).await.unwrap();
        h.tick();
        points.push(point);
    }

    let first = h
        .reader
        .history(h.window(), PageRequest::with_defaults(1, 2))
        .await
        .unwrap();
    let second = h
        .reader
        .history(h.window(), PageRequest::with_defaults(2, 2))
        .await
        .unwrap();
    let beyond = h
        .reader
        .history(h.window(), PageRequest::with_defaults(3, 2))
        .await
        .unwrap();

    let ids: Vec<_> = first
        .iter()
        .chain(second.iter())
        .map(|entry| entry.pickup_point.id)
        .collect();
    assert_eq!(ids, points.iter().map(|p| p.id).collect::<Vec<_>>());
    assert_eq!(second.len(), 1);
    assert!(beyond.is_empty());
}

#[tokio::test]
async fn history_excludes_receptions_outside_window() {
    let Some(h) = harness().await else { return };
    let point = h.store.create_pickup_point(City::Moscow).await.unwrap();
    h.store.open_reception(point.id).await.unwrap();
    h.store.close_reception(point.id).await.unwrap();

    h.clock.advance(Duration::hours(2));
    h.store.open_reception(point.id).await.unwrap();

    let history = h
        .reader
        .history(h.window(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].receptions.len(), 1);
    assert_eq!(history[0].receptions[0].reception.status, ReceptionStatus::Closed);

    let later = HistoryWindow::new(
        h.base + Duration::hours(3),
        h.base + Duration::hours(4),
    );
    assert!(h.reader.history(later, PageRequest::default()).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn open_close_churn_keeps_at_most_one_in_progress() {
    let Some(h) = harness().await else { return };
    let point = h.store.create_pickup_point(City::Kazan).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..64 {
        let store = h.store.clone();
        let pvz_id = point.id;
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                store.open_reception(pvz_id).await.map(|_| ())
            } else {
                store.close_reception(pvz_id).await.map(|_| ())
            }
        }));
    }

    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            assert!(
                matches!(
                    err,
                    LifecycleError::ReceptionInProgress(_) | LifecycleError::NoActiveReception(_)
                ),
                "unexpected error: {err}"
            );
        }
    }
    assert!(h.in_progress_count(point.id).await <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_removes_delete_each_product_once() {
    let Some(h) = harness().await else { return };
    let point = h.store.create_pickup_point(City::Moscow).await.unwrap();
    let reception = h.store.open_reception(point.id).await.unwrap();
    for _ in 0..10 {
        h.store.append_product(point.id, ProductType::Clothes).await.unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..15 {
        let store = h.store.clone();
        let pvz_id = point.id;
        handles.push(tokio::spawn(async move { store.remove_last_product(pvz_id).await }));
    }

    let mut removed = 0;
    let mut empty = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => removed += 1,
            Err(LifecycleError::NoProductsInReception(id)) => {
                assert_eq!(id, reception.id);
                empty += 1;
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(removed, 10);
    assert_eq!(empty, 5);
    assert_eq!(h.product_count(reception.id).await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn appends_racing_close_never_land_after_it() {
    let Some(h) = harness().await else { return };
    let point = h.store.create_pickup_point(City::SaintPetersburg).await.unwrap();
    let reception = h.store.open_reception(point.id).await.unwrap();

    let mut appends = Vec::new();
    for _ in 0..10 {
        let store = h.store.clone();
        let pvz_id = point.id;
        appends.push(tokio::spawn(async move {
            store.append_product(pvz_id, ProductType::Electronics).await
        }));
    }
    let closer = {
        let store = h.store.clone();
        let pvz_id = point.id;
        tokio::spawn(async move { store.close_reception(pvz_id).await })
    };
    for _ in 0..10 {
        let store = h.store.clone();
        let pvz_id = point.id;
        appends.push(tokio::spawn(async move {
            store.append_product(pvz_id, ProductType::Electronics).await
        }));
    }

    let closed = closer.await.unwrap().unwrap();
    assert_eq!(closed.id, reception.id);

    let mut appended = 0;
    for handle in appends {
        match handle.await.unwrap() {
            Ok(product) => {
                assert_eq!(product.reception_id, reception.id);
                appended += 1;
            }
            Err(LifecycleError::NoActiveReception(_)) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }

    // Every acknowledged append committed before the close; none after.
    assert_eq!(h.product_count(reception.id).await, appended);
    assert_eq!(h.in_progress_count(point.id).await, 0);
    let err = h
        .store
        .append_product(point.id, ProductType::Electronics)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NoActiveReception(_)));
}
