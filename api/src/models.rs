use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Envelope for a single record
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub success: bool,
    pub data: serde_json::Value,
}

impl ItemResponse {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Envelope for list endpoints. Paged lists always carry a `pagination`
/// object (possibly empty); radius results omit it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListResponse {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub data: Vec<serde_json::Value>,
}

impl ListResponse {
    /// Wrap one page of rows, with next/prev references where they exist
    pub fn from_page(page: database::Page<database::StoredItem>) -> Self {
        let mut pagination = Pagination::default();
        if page.has_next() {
            pagination.next = Some(PageRef {
                page: page.page + 1,
                limit: page.limit,
            });
        }
        if page.has_previous() {
            pagination.prev = Some(PageRef {
                page: page.page - 1,
                limit: page.limit,
            });
        }

        let data: Vec<serde_json::Value> = page
            .items
            .into_iter()
            .map(database::StoredItem::into_json)
            .collect();

        Self {
            success: true,
            count: data.len(),
            pagination: Some(pagination),
            data,
        }
    }

    /// Wrap an unpaged result set, e.g. a radius search
    pub fn from_items(items: Vec<database::StoredItem>) -> Self {
        let data: Vec<serde_json::Value> = items
            .into_iter()
            .map(database::StoredItem::into_json)
            .collect();

        Self {
            success: true,
            count: data.len(),
            pagination: None,
            data,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PageRef {
    pub page: i64,
    pub limit: i64,
}

/// Envelope for endpoints that issue a session token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

/// Order fields a client may send on create and update
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderPayload {
    pub title: String,
    pub description: String,
    pub address: String,
    pub total_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Food fields a client may send on create and update
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FoodPayload {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub quantity: i64,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub message: String,
}
