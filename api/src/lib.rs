use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use authz::RoutePolicy;
use uploads::PhotoStore;
use user::{Mailer, TokenService, UserStore};

pub mod error;
pub mod geocode;
pub mod handlers;
pub mod middleware_hooks;
pub mod models;
pub mod query;
pub mod server;

// Re-export server functions for convenience
pub use server::{
    spawn_server, spawn_server_with_config, start_server, start_server_with_config, ApiConfig,
};

/// Request body headroom over the photo size ceiling, covering multipart
/// boundaries and part headers
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<database::Database>,
    pub users: UserStore,
    pub tokens: TokenService,
    pub mailer: Mailer,
    pub photos: PhotoStore,
    pub geocoder: geocode::Geocoder,
    /// Session cookies carry the `Secure` attribute when true
    pub cookie_secure: bool,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::create_order,
        handlers::orders::update_order,
        handlers::orders::delete_order,
        handlers::orders::orders_within_radius,
        handlers::foods::list_foods,
        handlers::foods::list_order_foods,
        handlers::foods::get_food,
        handlers::foods::create_food,
        handlers::foods::update_food,
        handlers::foods::delete_food,
        handlers::foods::upload_food_photo,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::create_user,
        handlers::users::update_user,
        handlers::users::delete_user,
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::ItemResponse,
            models::ListResponse,
            models::Pagination,
            models::PageRef,
            models::TokenResponse,
            models::OrderPayload,
            models::FoodPayload,
            models::HealthResponse,
            models::DatabaseHealth,
            handlers::users::CreateUserRequest,
            handlers::users::UpdateUserRequest,
            error::ApiErrorBody,
        )
    ),
    tags(
        (name = "orders", description = "Order CRUD and radius search"),
        (name = "foods", description = "Food CRUD and photo upload"),
        (name = "users", description = "Admin account management"),
        (name = "health", description = "Health check endpoints"),
    ),
    info(
        title = "Platter API",
        version = "1.0.0",
        description = "RESTful API for the Platter ordering platform",
        contact(
            name = "Platter Team",
        ),
    ),
)]
pub struct ApiDoc;

/// Create the main API router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let upload_body_limit = state.photos.config().max_bytes as usize + UPLOAD_BODY_SLACK;

    // Open endpoints
    let public_routes = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/radius/:zipcode/:distance",
            get(handlers::orders::orders_within_radius),
        )
        .route("/orders/:id/foods", get(handlers::foods::list_order_foods))
        .route("/foods", get(handlers::foods::list_foods))
        .route("/foods/:id", get(handlers::foods::get_food))
        .route("/health", get(handlers::health::health_check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/forgotpassword", post(handlers::auth::forgot_password))
        .route(
            "/auth/resetpassword/:resettoken",
            put(handlers::auth::reset_password),
        );

    // Publishing endpoints: authenticate, then require Publisher or Admin.
    // Ownership of the loaded row is checked inside each handler.
    let publisher_policy = RoutePolicy::publishers();
    let publisher_routes = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route(
            "/orders/:id",
            put(handlers::orders::update_order).delete(handlers::orders::delete_order),
        )
        .route("/orders/:id/foods", post(handlers::foods::create_food))
        .route(
            "/foods/:id",
            put(handlers::foods::update_food).delete(handlers::foods::delete_food),
        )
        .route(
            "/foods/:id/photo",
            put(handlers::foods::upload_food_photo).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route_layer(middleware::from_fn(move |request: Request, next: Next| {
            let policy = publisher_policy.clone();
            async move { middleware_hooks::authorize_roles(policy, request, next).await }
        }))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            middleware_hooks::authenticate,
        ));

    // Session endpoints open to any authenticated account
    let account_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::current_user))
        .route("/auth/updatedetails", put(handlers::auth::update_details))
        .route("/auth/updatepassword", put(handlers::auth::update_password))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            middleware_hooks::authenticate,
        ));

    // Admin console
    let admin_policy = RoutePolicy::admin_only();
    let admin_routes = Router::new()
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/users/:id",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route_layer(middleware::from_fn(move |request: Request, next: Next| {
            let policy = admin_policy.clone();
            async move { middleware_hooks::authorize_roles(policy, request, next).await }
        }))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            middleware_hooks::authenticate,
        ));

    let api_v1 = Router::new()
        .merge(public_routes)
        .merge(publisher_routes)
        .merge(account_routes)
        .merge(admin_routes);

    // Main router
    Router::new()
        .nest("/api/v1", api_v1)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(middleware_hooks::security_headers)),
        )
        .with_state(state)
}
