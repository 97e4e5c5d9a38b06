//! # api-adapters
//!
//! The HTTP routing layer. Handlers only parse requests, call the
//! [`BoardEngine`](services::BoardEngine) and shape responses; no board
//! rules live here.

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;

#[cfg(feature = "web-axum")]
pub use error::ApiError;
#[cfg(feature = "web-axum")]
pub use handlers::AppState;

#[cfg(feature = "web-axum")]
use axum::{
    routing::{get, post},
    Router,
};
#[cfg(feature = "web-axum")]
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Builds the board router.
///
/// Every request gets an `x-request-id` (generated when absent) that is
/// echoed on the response and recorded by the trace layer.
#[cfg(feature = "web-axum")]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/page/{num}", get(handlers::list_page))
        .route("/captcha", get(handlers::issue_captcha))
        .route("/post/", post(handlers::create_post))
        .route("/post/{id}", get(handlers::fetch_thread))
        .route("/delete/", post(handlers::delete_post))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
