//! Food handlers: CRUD under an order, the flat food routes and photo upload.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{json, Map, Value};
use tracing::info;

use authz::{authorize_ownership, Principal};
use database::{EntityStorage, Filter, FilterOp, Populate};
use entities::definitions;
use uploads::UploadError;

use crate::{
    error::{ApiError, ApiErrorBody, ApiResult},
    models::{FoodPayload, ItemResponse, ListResponse},
    query::parse_list_query,
    AppState,
};

/// Columns the server derives itself; client-sent values are dropped.
/// `photo` only changes through the upload route.
const SERVER_SET_COLUMNS: [&str; 3] = ["owner", "order_id", "photo"];

fn strip_server_set_columns(payload: &mut Map<String, Value>) {
    for column in SERVER_SET_COLUMNS {
        payload.remove(column);
    }
}

/// The parent order columns joined onto food reads
fn order_populate() -> Populate {
    Populate::parent("order_id", definitions::orders(), &["title", "description"])
}

/// One multipart file part: original name, content type, bytes
async fn read_file_part(
    mut multipart: Multipart,
) -> ApiResult<(String, String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(format!("Invalid multipart payload: {}", err)))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::Validation(format!("Invalid multipart payload: {}", err)))?;
        return Ok((file_name, content_type, bytes.to_vec()));
    }

    Err(UploadError::MissingFile.into())
}

/// List foods
///
/// GET /api/v1/foods
#[utoipa::path(
    get,
    path = "/api/v1/foods",
    params(
        ("select" = Option<String>, Query, description = "Comma-separated projection"),
        ("sort" = Option<String>, Query, description = "Comma-separated sort keys, '-' prefix for descending"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<i64>, Query, description = "Page size (default: 25, max: 100)")
    ),
    responses(
        (status = 200, description = "One page of foods with their parent order summary", body = ListResponse),
        (status = 400, description = "Invalid query", body = ApiErrorBody)
    ),
    tag = "foods"
)]
pub async fn list_foods(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    let query = parse_list_query(&params)?;

    let storage = EntityStorage::new(&state.db, definitions::foods());
    let page = storage.list(&query, Some(&order_populate())).await?;

    Ok(Json(ListResponse::from_page(page)))
}

/// List the foods of one order
///
/// GET /api/v1/orders/{id}/foods
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/foods",
    params(
        ("id" = String, Path, description = "Order id"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<i64>, Query, description = "Page size (default: 25, max: 100)")
    ),
    responses(
        (status = 200, description = "One page of the order's foods", body = ListResponse),
        (status = 400, description = "Invalid query", body = ApiErrorBody)
    ),
    tag = "foods"
)]
pub async fn list_order_foods(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    let mut query = parse_list_query(&params)?;
    query
        .filters
        .push(Filter::new("order_id", FilterOp::Eq, order_id.as_str()));

    let storage = EntityStorage::new(&state.db, definitions::foods());
    let page = storage.list(&query, None).await?;

    Ok(Json(ListResponse::from_page(page)))
}

/// Read a single food with its parent order summary
///
/// GET /api/v1/foods/{id}
#[utoipa::path(
    get,
    path = "/api/v1/foods/{id}",
    params(("id" = String, Path, description = "Food id")),
    responses(
        (status = 200, description = "The food", body = ItemResponse),
        (status = 404, description = "No such food", body = ApiErrorBody)
    ),
    tag = "foods"
)]
pub async fn get_food(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::foods());

    let item = storage
        .get(&id, Some(&order_populate()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found with id of {}", id)))?;

    Ok(Json(ItemResponse::new(item.into_json())))
}

/// Add a food to an order
///
/// POST /api/v1/orders/{id}/foods
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/foods",
    params(("id" = String, Path, description = "Order id")),
    request_body = FoodPayload,
    responses(
        (status = 201, description = "Food created", body = ItemResponse),
        (status = 400, description = "Invalid payload", body = ApiErrorBody),
        (status = 403, description = "Not the order's owner", body = ApiErrorBody),
        (status = 404, description = "No such order", body = ApiErrorBody)
    ),
    tag = "foods"
)]
pub async fn create_food(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(order_id): Path<String>,
    Json(mut payload): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    let orders = EntityStorage::new(&state.db, definitions::orders());

    let order = orders
        .get(&order_id, None)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No order with the id of {}", order_id)))?;

    authorize_ownership(&principal, order.str_value("owner").unwrap_or_default())?;

    strip_server_set_columns(&mut payload);
    payload.insert("order_id".to_string(), json!(order_id));
    payload.insert("owner".to_string(), json!(principal.id));

    let storage = EntityStorage::new(&state.db, definitions::foods());
    let item = storage.create(payload).await?;

    info!("Food {} added to order {} by {}", item.id, order_id, principal.id);

    Ok((StatusCode::CREATED, Json(ItemResponse::new(item.into_json()))))
}

/// Update a food
///
/// PUT /api/v1/foods/{id}
#[utoipa::path(
    put,
    path = "/api/v1/foods/{id}",
    params(("id" = String, Path, description = "Food id")),
    request_body = FoodPayload,
    responses(
        (status = 200, description = "Updated food", body = ItemResponse),
        (status = 403, description = "Not the owner", body = ApiErrorBody),
        (status = 404, description = "No such food", body = ApiErrorBody)
    ),
    tag = "foods"
)]
pub async fn update_food(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(mut payload): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::foods());

    let existing = storage
        .get(&id, None)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found with id of {}", id)))?;

    authorize_ownership(&principal, existing.str_value("owner").unwrap_or_default())?;

    strip_server_set_columns(&mut payload);

    let item = storage.update(&id, payload).await?;

    info!("Food {} updated by {}", id, principal.id);

    Ok(Json(ItemResponse::new(item.into_json())))
}

/// Delete a food
///
/// DELETE /api/v1/foods/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/foods/{id}",
    params(("id" = String, Path, description = "Food id")),
    responses(
        (status = 200, description = "Food deleted", body = ItemResponse),
        (status = 403, description = "Not the owner", body = ApiErrorBody),
        (status = 404, description = "No such food", body = ApiErrorBody)
    ),
    tag = "foods"
)]
pub async fn delete_food(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::foods());

    let existing = storage
        .get(&id, None)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found with id of {}", id)))?;

    authorize_ownership(&principal, existing.str_value("owner").unwrap_or_default())?;

    storage.delete(&id).await?;

    info!("Food {} deleted by {}", id, principal.id);

    Ok(Json(ItemResponse::new(json!({}))))
}

/// Upload a food photo
///
/// PUT /api/v1/foods/{id}/photo
#[utoipa::path(
    put,
    path = "/api/v1/foods/{id}/photo",
    params(("id" = String, Path, description = "Food id")),
    responses(
        (status = 200, description = "Stored file name", body = ItemResponse),
        (status = 400, description = "Missing, oversized or non-image file", body = ApiErrorBody),
        (status = 403, description = "Not the owner", body = ApiErrorBody),
        (status = 404, description = "No such food", body = ApiErrorBody)
    ),
    tag = "foods"
)]
pub async fn upload_food_photo(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::foods());

    let existing = storage
        .get(&id, None)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found with id of {}", id)))?;

    authorize_ownership(&principal, existing.str_value("owner").unwrap_or_default())?;

    let (file_name, content_type, bytes) = read_file_part(multipart).await?;

    let stored_name = state
        .photos
        .store_photo(&id, &file_name, &content_type, &bytes)
        .await?;

    let mut update = Map::new();
    update.insert("photo".to_string(), json!(stored_name));
    storage.update(&id, update).await?;

    info!("Photo {} stored for food {} by {}", stored_name, id, principal.id);

    Ok(Json(ItemResponse::new(json!(stored_name))))
}
