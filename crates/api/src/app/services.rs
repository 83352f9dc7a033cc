use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use pvz_core::{Clock, DomainError, ErrorKind, PickupPointId, SystemClock};
use pvz_infra::config::ConfigError;
use pvz_infra::{
    db, HistoryQuery, HistoryWindow, InMemoryLifecycleStore, LifecycleError, LifecycleStore,
    PageRequest, PostgresHistoryReader, PostgresLifecycleStore,
};
use pvz_receiving::{City, PickupPoint, PickupPointHistory, Product, ProductType, Reception};

use crate::config::ServerConfig;

/// Error returned by [`LifecycleService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A caller-supplied argument failed to parse.
    #[error(transparent)]
    Invalid(#[from] DomainError),

    /// The store rejected or failed the operation.
    #[error("{context}: {source}")]
    Lifecycle {
        context: String,
        #[source]
        source: LifecycleError,
    },
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Invalid(e) => e.kind(),
            ServiceError::Lifecycle { source, .. } => source.kind(),
        }
    }
}

fn in_context(context: String) -> impl FnOnce(LifecycleError) -> ServiceError {
    move |source| ServiceError::Lifecycle { context, source }
}

/// Raw history arguments as received from a caller.
///
/// Dates are RFC 3339 strings; a zero page or limit means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: u32,
    pub limit: u32,
}

/// Orchestration over the lifecycle store and the history reader.
///
/// Parses primitive arguments into domain values and attaches the implicated
/// argument to store errors. Holds no state of its own; clones share the
/// underlying store.
#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn LifecycleStore>,
    history: Arc<dyn HistoryQuery>,
    clock: Arc<dyn Clock>,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn LifecycleStore>,
        history: Arc<dyn HistoryQuery>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            history,
            clock,
        }
    }

    /// In-memory store and reader sharing `clock`.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(InMemoryLifecycleStore::with_clock(clock.clone()));
        Self::new(store.clone(), store, clock)
    }

    pub async fn create_pickup_point(&self, city: &str) -> Result<PickupPoint, ServiceError> {
        let city: City = city.parse()?;
        self.store
            .create_pickup_point(city)
            .await
            .map_err(in_context(format!("create pickup point in {city}")))
    }

    pub async fn open_reception(&self, pvz_id: &str) -> Result<Reception, ServiceError> {
        let pvz_id: PickupPointId = pvz_id.parse()?;
        self.store
            .open_reception(pvz_id)
            .await
            .map_err(in_context(format!("open reception for pvz {pvz_id}")))
    }

    pub async fn add_product(&self, pvz_id: &str, product_type: &str) -> Result<Product, ServiceError> {
        let pvz_id: PickupPointId = pvz_id.parse()?;
        let product_type: ProductType = product_type.parse()?;
        self.store
            .append_product(pvz_id, product_type)
            .await
            .map_err(in_context(format!("add {product_type} to pvz {pvz_id}")))
    }

    pub async fn delete_last_product(&self, pvz_id: &str) -> Result<(), ServiceError> {
        let pvz_id: PickupPointId = pvz_id.parse()?;
        self.store
            .remove_last_product(pvz_id)
            .await
            .map_err(in_context(format!("delete last product of pvz {pvz_id}")))
    }

    pub async fn close_last_reception(&self, pvz_id: &str) -> Result<Reception, ServiceError> {
        let pvz_id: PickupPointId = pvz_id.parse()?;
        self.store
            .close_reception(pvz_id)
            .await
            .map_err(in_context(format!("close reception of pvz {pvz_id}")))
    }

    /// Paginated history.
    ///
    /// An absent or empty `start_date` means the Unix epoch; an absent or empty
    /// `end_date` means now, so identical calls may see different windows.
    pub async fn history(&self, params: HistoryParams) -> Result<Vec<PickupPointHistory>, ServiceError> {
        let window = self.window(params.start_date.as_deref(), params.end_date.as_deref())?;
        let page = PageRequest::with_defaults(params.page, params.limit);

        self.history
            .history(window, page)
            .await
            .map_err(in_context(format!(
                "history {}..{} page {} limit {}",
                window.start,
                window.end,
                page.page(),
                page.limit()
            )))
    }

    fn window(&self, start: Option<&str>, end: Option<&str>) -> Result<HistoryWindow, DomainError> {
        let start = parse_bound("startDate", start)?.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let end = match parse_bound("endDate", end)? {
            Some(end) => end,
            None => self.clock.now(),
        };
        Ok(HistoryWindow::new(start, end))
    }
}

fn parse_bound(field: &'static str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, DomainError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| Some(ts.with_timezone(&Utc)))
        .map_err(|e| DomainError::invalid_date(field, raw, e))
}

/// Failure while wiring services at startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database setup failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// Build the service from configuration: Postgres-backed when
/// `use_persistent_stores` is set, in-memory otherwise.
pub async fn build_services(config: &ServerConfig) -> Result<LifecycleService, SetupError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if !config.use_persistent_stores {
        info!("using in-memory stores");
        return Ok(LifecycleService::in_memory(clock));
    }

    let pool = db::connect(&config.database).await?;
    if config.bootstrap_schema {
        db::bootstrap_schema(&pool).await?;
    } else {
        warn!("DB_BOOTSTRAP_SCHEMA not set; assuming the schema exists");
    }

    let store = Arc::new(PostgresLifecycleStore::with_clock(pool.clone(), clock.clone()));
    let reader = Arc::new(PostgresHistoryReader::new(pool));
    info!("using postgres stores");
    Ok(LifecycleService::new(store, reader, clock))
}
