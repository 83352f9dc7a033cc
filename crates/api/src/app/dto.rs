use axum::http::StatusCode;
use serde::Deserialize;

use crate::app::errors;
use crate::app::services::HistoryParams;
use crate::auth::Role;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct DummyLoginRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreatePickupPointRequest {
    pub city: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReceptionRequest {
    pub pvz_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProductRequest {
    #[serde(rename = "type")]
    pub product_type: String,
    pub pvz_id: String,
}

/// `GET /pvz` query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQueryParams {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl HistoryQueryParams {
    pub const MAX_LIMIT: u32 = 30;

    /// Range-check page/limit; absent values fall through to the service
    /// defaults.
    pub fn validate(self) -> Result<HistoryParams, axum::response::Response> {
        if self.page == Some(0) {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_argument",
                "page must be at least 1",
            ));
        }
        if let Some(limit) = self.limit {
            if !(1..=Self::MAX_LIMIT).contains(&limit) {
                return Err(errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_argument",
                    format!("limit must be between 1 and {}", Self::MAX_LIMIT),
                ));
            }
        }

        Ok(HistoryParams {
            start_date: self.start_date,
            end_date: self.end_date,
            page: self.page.unwrap_or(0),
            limit: self.limit.unwrap_or(0),
        })
    }
}
