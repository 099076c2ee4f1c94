//! Order handlers: CRUD, slug generation, geocoding and the radius search.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{json, Map, Value};
use tracing::info;

use authz::{authorize_ownership, Principal};
use database::{EntityStorage, Populate};
use entities::definitions;

use crate::{
    error::{ApiError, ApiErrorBody, ApiResult},
    models::{ItemResponse, ListResponse, OrderPayload},
    query::parse_list_query,
    AppState,
};

/// Columns the server derives itself; client-sent values are dropped
const SERVER_SET_COLUMNS: [&str; 6] = [
    "slug",
    "owner",
    "owner_unique",
    "latitude",
    "longitude",
    "formatted_address",
];

/// URL-safe form of a title: lowercased, with every non-alphanumeric run
/// collapsed into a single hyphen
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn strip_server_set_columns(payload: &mut Map<String, Value>) {
    for column in SERVER_SET_COLUMNS {
        payload.remove(column);
    }
}

/// The foods relation attached to order reads
fn foods_populate() -> Populate {
    Populate::children("foods", definitions::foods(), "order_id")
}

/// List orders
///
/// GET /api/v1/orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(
        ("select" = Option<String>, Query, description = "Comma-separated projection"),
        ("sort" = Option<String>, Query, description = "Comma-separated sort keys, '-' prefix for descending"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<i64>, Query, description = "Page size (default: 25, max: 100)")
    ),
    responses(
        (status = 200, description = "One page of orders", body = ListResponse),
        (status = 400, description = "Invalid query", body = ApiErrorBody)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    let query = parse_list_query(&params)?;

    let storage = EntityStorage::new(&state.db, definitions::orders());
    let page = storage.list(&query, Some(&foods_populate())).await?;

    Ok(Json(ListResponse::from_page(page)))
}

/// Read a single order with its foods
///
/// GET /api/v1/orders/{id}
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = ItemResponse),
        (status = 404, description = "No such order", body = ApiErrorBody)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::orders());

    let item = storage
        .get(&id, Some(&foods_populate()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found with id of {}", id)))?;

    Ok(Json(ItemResponse::new(item.into_json())))
}

/// Publish a new order
///
/// POST /api/v1/orders
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = OrderPayload,
    responses(
        (status = 201, description = "Order created", body = ItemResponse),
        (status = 400, description = "Invalid payload or already published", body = ApiErrorBody),
        (status = 401, description = "Not authenticated", body = ApiErrorBody),
        (status = 403, description = "Role not allowed to publish", body = ApiErrorBody)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(mut payload): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::orders());

    // Non-admins get one order; the unique owner key below backstops this
    // check against concurrent creates.
    if !principal.is_admin() && storage.find_one("owner", &principal.id).await?.is_some() {
        return Err(ApiError::Conflict(format!(
            "The user with ID {} has already published an order",
            principal.id
        )));
    }

    strip_server_set_columns(&mut payload);

    if let Some(title) = payload.get("title").and_then(Value::as_str) {
        payload.insert("slug".to_string(), json!(slugify(title)));
    }

    if let Some(address) = payload
        .get("address")
        .and_then(Value::as_str)
        .map(str::to_string)
    {
        let geocoded = state.geocoder.forward(&address).await?;
        payload.insert("latitude".to_string(), json!(geocoded.latitude));
        payload.insert("longitude".to_string(), json!(geocoded.longitude));
        payload.insert(
            "formatted_address".to_string(),
            json!(geocoded.formatted_address),
        );
    }

    payload.insert("owner".to_string(), json!(principal.id));
    if !principal.is_admin() {
        payload.insert("owner_unique".to_string(), json!(principal.id));
    }

    let item = storage.create(payload).await?;

    info!("Order {} published by {}", item.id, principal.id);

    Ok((StatusCode::CREATED, Json(ItemResponse::new(item.into_json()))))
}

/// Update an order
///
/// PUT /api/v1/orders/{id}
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    params(("id" = String, Path, description = "Order id")),
    request_body = OrderPayload,
    responses(
        (status = 200, description = "Updated order", body = ItemResponse),
        (status = 403, description = "Not the owner", body = ApiErrorBody),
        (status = 404, description = "No such order", body = ApiErrorBody)
    ),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(mut payload): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::orders());

    let existing = storage
        .get(&id, None)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found with id of {}", id)))?;

    authorize_ownership(&principal, existing.str_value("owner").unwrap_or_default())?;

    strip_server_set_columns(&mut payload);

    let item = storage.update(&id, payload).await?;

    info!("Order {} updated by {}", id, principal.id);

    Ok(Json(ItemResponse::new(item.into_json())))
}

/// Delete an order together with its foods
///
/// DELETE /api/v1/orders/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = String, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order deleted", body = ItemResponse),
        (status = 403, description = "Not the owner", body = ApiErrorBody),
        (status = 404, description = "No such order", body = ApiErrorBody)
    ),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::orders());

    let existing = storage
        .get(&id, None)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found with id of {}", id)))?;

    authorize_ownership(&principal, existing.str_value("owner").unwrap_or_default())?;

    // Foods never outlive their order
    let foods = EntityStorage::new(&state.db, definitions::foods());
    foods.delete_where("order_id", &id).await?;
    storage.delete(&id).await?;

    info!("Order {} deleted by {}", id, principal.id);

    Ok(Json(ItemResponse::new(json!({}))))
}

/// Orders within a distance (miles) of a zipcode
///
/// GET /api/v1/orders/radius/{zipcode}/{distance}
#[utoipa::path(
    get,
    path = "/api/v1/orders/radius/{zipcode}/{distance}",
    params(
        ("zipcode" = String, Path, description = "Center zipcode"),
        ("distance" = f64, Path, description = "Search radius in miles")
    ),
    responses(
        (status = 200, description = "Orders inside the radius", body = ListResponse),
        (status = 400, description = "Unresolvable zipcode or bad distance", body = ApiErrorBody),
        (status = 502, description = "Geocoder unavailable", body = ApiErrorBody)
    ),
    tag = "orders"
)]
pub async fn orders_within_radius(
    State(state): State<AppState>,
    Path((zipcode, distance)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let miles: f64 = distance
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid distance '{}'", distance)))?;
    if !miles.is_finite() || miles < 0.0 {
        return Err(ApiError::Validation(format!("Invalid distance '{}'", distance)));
    }

    let center = state.geocoder.forward(&zipcode).await?;

    let storage = EntityStorage::new(&state.db, definitions::orders());
    let items = storage
        .list_within_radius(center.latitude, center.longitude, miles)
        .await?;

    Ok(Json(ListResponse::from_items(items)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Family Dinner"), "family-dinner");
        assert_eq!(slugify("  Brunch -- & Coffee  "), "brunch-coffee");
        assert_eq!(slugify("Taco's #1 Night!"), "taco-s-1-night");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn test_server_set_columns_are_stripped() {
        let mut payload = json!({
            "title": "Dinner",
            "owner": "intruder",
            "owner_unique": "intruder",
            "slug": "forced",
            "latitude": 1.0,
            "longitude": 2.0,
            "formatted_address": "forged",
        })
        .as_object()
        .cloned()
        .unwrap();

        strip_server_set_columns(&mut payload);

        assert_eq!(payload.len(), 1);
        assert!(payload.contains_key("title"));
    }
}
