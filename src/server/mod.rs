// src/server/mod.rs

//! The casting agency HTTP API.
//!
//! Every route except the health check runs its work through the
//! [`AuthorizationGuard`], so authorization failures are answered before the
//! request body or path is looked at.

mod handlers;
pub mod response;
pub mod store;

use crate::guard::AuthorizationGuard;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, AUTHORIZATION, CONTENT_TYPE,
};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use store::MemoryStore;
use tower_http::cors::{Any, CorsLayer};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub guard: AuthorizationGuard,
    pub store: MemoryStore,
}

impl AppState {
    pub fn new(guard: AuthorizationGuard, store: MemoryStore) -> Self {
        Self { guard, store }
    }
}

/// Answers preflight requests and allows any origin.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, HeaderName::from_static("true")])
}

/// Every response, not only preflights, advertises the accepted headers and methods.
async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization, true"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PATCH, DELETE, OPTIONS"),
    );
    response
}

/// Builds the router for `/`, `/actors` and `/movies`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/actors", get(handlers::list_actors).post(handlers::create_actor))
        .route(
            "/actors/:id",
            axum::routing::patch(handlers::update_actor).delete(handlers::delete_actor),
        )
        .route("/movies", get(handlers::list_movies).post(handlers::create_movie))
        .route(
            "/movies/:id",
            axum::routing::patch(handlers::update_movie).delete(handlers::delete_movie),
        )
        .fallback(handlers::not_found)
        .layer(cors_layer())
        .layer(middleware::map_response(add_cors_headers))
        .with_state(state)
}
