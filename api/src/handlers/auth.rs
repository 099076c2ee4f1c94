//! Account and session handlers: register, login, logout, profile and the
//! password reset flow.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use authz::{Principal, Role};
use fields::{Field, FieldType, FieldValidator};
use user::{NewUser, UserRecord, UserUpdate};

use crate::{
    error::{ApiError, ApiResult},
    middleware_hooks::{clear_token_cookie, token_cookie},
    models::{ItemResponse, TokenResponse},
    AppState,
};

const MIN_PASSWORD_LENGTH: usize = 6;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDetailsRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Trim a request field, treating a blank value the same as an absent one
pub(crate) fn provided(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn validate_email(email: &str) -> ApiResult<()> {
    let field = Field::new("email", FieldType::Text, "Email").email().required(true);
    FieldValidator::validate_field_value(&field, &json!(email))
        .map_err(|err| ApiError::Validation(err.to_string()))
}

pub(crate) fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Issue a fresh token for the account, sending it both in the body and as
/// the session cookie
fn token_response(state: &AppState, principal_id: &str, status: StatusCode) -> ApiResult<Response> {
    let token = state.tokens.issue(principal_id)?;
    let cookie = token_cookie(&token, state.tokens.expire_days(), state.cookie_secure);

    let mut response = (
        status,
        Json(TokenResponse {
            success: true,
            token,
        }),
    )
        .into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);

    Ok(response)
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new account
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Response> {
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

    let role = provided(request.role).unwrap_or_else(|| Role::User.as_str().to_string());
    let parsed: Role = role
        .parse()
        .map_err(|_| ApiError::Validation(format!("Invalid role '{}'", role)))?;
    if !parsed.self_assignable() {
        return Err(ApiError::Validation(format!(
            "Role '{}' cannot be chosen at registration",
            role
        )));
    }

    let account = state
        .users
        .create(NewUser {
            name,
            email,
            password,
            role,
        })
        .await?;

    info!("Registered account {}", account.id);

    token_response(&state, &account.id, StatusCode::CREATED)
}

/// Log in with email and password
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Response> {
    let (Some(email), Some(password)) = (provided(request.email), provided(request.password))
    else {
        return Err(ApiError::Validation(
            "Please provide an email and password".to_string(),
        ));
    };

    let account = state.users.verify_credentials(&email, &password).await?;

    info!("Login for account {}", account.id);

    token_response(&state, &account.id, StatusCode::OK)
}

/// Clear the session cookie
/// POST /api/v1/auth/logout
pub async fn logout(State(state): State<AppState>) -> ApiResult<Response> {
    let mut response = Json(ItemResponse::new(json!({}))).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, clear_token_cookie(state.cookie_secure));

    Ok(response)
}

/// The authenticated account's own record
/// GET /api/v1/auth/me
pub async fn current_user(
    Extension(account): Extension<UserRecord>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(ItemResponse::new(serde_json::to_value(&account)?)))
}

/// Update the authenticated account's name and email
/// PUT /api/v1/auth/updatedetails
pub async fn update_details(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<UpdateDetailsRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = provided(request.email);
    if let Some(email) = &email {
        validate_email(email)?;
    }

    let update = UserUpdate {
        name: provided(request.name),
        email,
        ..UserUpdate::default()
    };
    let account = state.users.update_user(&principal.id, update).await?;

    info!("Updated account details for {}", principal.id);

    Ok(Json(ItemResponse::new(serde_json::to_value(&account)?)))
}

/// Change the authenticated account's password, proving the current one
/// PUT /api/v1/auth/updatepassword
pub async fn update_password(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<UpdatePasswordRequest>,
) -> ApiResult<Response> {
    let (Some(current), Some(new)) = (
        provided(request.current_password),
        provided(request.new_password),
    ) else {
        return Err(ApiError::Validation(
            "Please provide a current and new password".to_string(),
        ));
    };

    validate_password(&new)?;

    if !state.users.password_matches(&principal.id, &current).await? {
        return Err(ApiError::Unauthenticated("Password is incorrect".to_string()));
    }

    state.users.update_password(&principal.id, &new).await?;

    info!("Password changed for account {}", principal.id);

    token_response(&state, &principal.id, StatusCode::OK)
}

/// Start the password reset flow: store a hashed token and mail the link
/// POST /api/v1/auth/forgotpassword
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(email) = provided(request.email) else {
        return Err(ApiError::Validation("Please add an email".to_string()));
    };

    let Some((account, token)) = state.users.begin_password_reset(&email).await? else {
        return Err(ApiError::NotFound(
            "There is no user with that email".to_string(),
        ));
    };

    if let Err(err) = state
        .mailer
        .send_password_reset(&account.email, &account.name, &token.plain)
        .await
    {
        // Do not leave a live reset token behind when the mail never went out
        if let Err(clear_err) = state.users.clear_reset_token(&account.id).await {
            error!(
                "Failed to clear reset token for {}: {}",
                account.id, clear_err
            );
        }
        return Err(err.into());
    }

    info!("Password reset email sent for account {}", account.id);

    Ok(Json(ItemResponse::new(json!("Email sent"))))
}

/// Complete the password reset flow with the mailed token
/// PUT /api/v1/auth/resetpassword/:resettoken
pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<Response> {
    let Some(password) = provided(request.password) else {
        return Err(ApiError::Validation("Please add a password".to_string()));
    };
    validate_password(&password)?;

    let Some(account) = state.users.find_by_reset_token(&reset_token).await? else {
        return Err(ApiError::Validation("Invalid token".to_string()));
    };

    state
        .users
        .complete_password_reset(&account.id, &password)
        .await?;

    info!("Password reset completed for account {}", account.id);

    token_response(&state, &account.id, StatusCode::OK)
}
