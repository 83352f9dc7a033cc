//! History read model: pickup points with the receptions opened in a time
//! window, and every product of those receptions.
//!
//! Reads are non-locking. A result is a point-in-time view and may interleave
//! with concurrent writers (no transaction spans the three queries).

pub mod assemble;
pub mod postgres;

pub use assemble::assemble;
pub use postgres::PostgresHistoryReader;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pvz_receiving::PickupPointHistory;

use crate::lifecycle_store::LifecycleError;

/// Inclusive time window on reception creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl HistoryWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `start <= ts <= end`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// 1-based page of pickup points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Build a page request, substituting defaults for zero values.
    pub fn with_defaults(page: u32, limit: u32) -> Self {
        Self {
            page: if page == 0 { Self::DEFAULT_PAGE } else { page },
            limit: if limit == 0 { Self::DEFAULT_LIMIT } else { limit },
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::with_defaults(0, 0)
    }
}

/// Paginated history query.
///
/// Returns every pickup point with at least one reception created inside
/// `window`, ordered by the pickup point's creation time ascending and paged by
/// `page`. Each point nests only its in-window receptions (ascending); each
/// reception nests all of its products (ascending), regardless of when they
/// were logged.
#[async_trait::async_trait]
pub trait HistoryQuery: Send + Sync {
    async fn history(
        &self,
        window: HistoryWindow,
        page: PageRequest,
    ) -> Result<Vec<PickupPointHistory>, LifecycleError>;
}

#[async_trait::async_trait]
impl<H> HistoryQuery for Arc<H>
where
    H: HistoryQuery + ?Sized,
{
    async fn history(
        &self,
        window: HistoryWindow,
        page: PageRequest,
    ) -> Result<Vec<PickupPointHistory>, LifecycleError> {
        (**self).history(window, page).await
    }
}
