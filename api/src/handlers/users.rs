//! Admin console handlers for account management.
//!
//! Reads go through the generic storage layer so the query builder applies;
//! writes go through [`user::UserStore`] so password hashing stays in one
//! place. Credential columns are hidden and never leave the server.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use tracing::info;
use utoipa::ToSchema;

use authz::Role;
use database::EntityStorage;
use entities::definitions;
use user::{NewUser, UserUpdate};

use crate::{
    error::{ApiError, ApiErrorBody, ApiResult},
    handlers::auth::{provided, validate_email, validate_password},
    models::{ItemResponse, ListResponse},
    query::parse_list_query,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

/// An admin may assign any role, unlike self-registration
fn parse_role(raw: &str) -> ApiResult<Role> {
    Role::from_str(raw).map_err(|_| ApiError::Validation(format!("Invalid role '{}'", raw)))
}

/// List accounts
///
/// GET /api/v1/users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(
        ("select" = Option<String>, Query, description = "Comma-separated projection"),
        ("sort" = Option<String>, Query, description = "Comma-separated sort keys, '-' prefix for descending"),
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<i64>, Query, description = "Page size (default: 25, max: 100)")
    ),
    responses(
        (status = 200, description = "One page of accounts", body = ListResponse),
        (status = 401, description = "Not authenticated", body = ApiErrorBody),
        (status = 403, description = "Not an admin", body = ApiErrorBody)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<impl IntoResponse> {
    let query = parse_list_query(&params)?;

    let storage = EntityStorage::new(&state.db, definitions::users());
    let page = storage.list(&query, None).await?;

    Ok(Json(ListResponse::from_page(page)))
}

/// Read a single account
///
/// GET /api/v1/users/{id}
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "The account", body = ItemResponse),
        (status = 404, description = "No such account", body = ApiErrorBody)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let storage = EntityStorage::new(&state.db, definitions::users());

    let item = storage
        .get(&id, None)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Resource not found with id of {}", id)))?;

    Ok(Json(ItemResponse::new(item.into_json())))
}

/// Create an account
///
/// POST /api/v1/users
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = ItemResponse),
        (status = 400, description = "Invalid payload or duplicate email", body = ApiErrorBody)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(name) = provided(request.name) else {
        return Err(ApiError::Validation("Please add a name".to_string()));
    };
    let Some(email) = provided(request.email) else {
        return Err(ApiError::Validation("Please add an email".to_string()));
    };
    let Some(password) = provided(request.password) else {
        return Err(ApiError::Validation("Please add a password".to_string()));
    };
    validate_email(&email)?;
    validate_password(&password)?;

    let role = match provided(request.role) {
        Some(raw) => parse_role(&raw)?,
        None => Role::User,
    };

    let record = state
        .users
        .create(NewUser {
            name,
            email,
            password,
            role: role.as_str().to_string(),
        })
        .await?;

    info!("Account {} created by admin console", record.id);

    Ok((
        StatusCode::CREATED,
        Json(ItemResponse::new(serde_json::to_value(record)?)),
    ))
}

/// Update an account
///
/// PUT /api/v1/users/{id}
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated account", body = ItemResponse),
        (status = 400, description = "Invalid payload or duplicate email", body = ApiErrorBody),
        (status = 404, description = "No such account", body = ApiErrorBody)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = provided(request.email);
    if let Some(email) = email.as_deref() {
        validate_email(email)?;
    }
    let password = provided(request.password);
    if let Some(password) = password.as_deref() {
        validate_password(password)?;
    }
    let role = match provided(request.role) {
        Some(raw) => Some(parse_role(&raw)?.as_str().to_string()),
        None => None,
    };

    let record = state
        .users
        .update_user(
            &id,
            UserUpdate {
                name: provided(request.name),
                email,
                role,
                password,
            },
        )
        .await?;

    info!("Account {} updated by admin console", id);

    Ok(Json(ItemResponse::new(serde_json::to_value(record)?)))
}

/// Delete an account
///
/// DELETE /api/v1/users/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Account deleted", body = ItemResponse),
        (status = 404, description = "No such account", body = ApiErrorBody)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.users.delete(&id).await?;

    info!("Account {} deleted by admin console", id);

    Ok(Json(ItemResponse::new(json!({}))))
}
