//! JSON-over-HTTP surface for the kiosk.

mod error;
mod handlers;

pub use error::{ApiError, BookingError};

use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::observability::{
    HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL, REQUESTS_ACTIVE, REQUESTS_REJECTED_TOTAL,
};

/// All routes, with request metrics, tracing, and at most `max_in_flight`
/// requests served at once (the rest get 503).
pub fn router(engine: Arc<Engine>, max_in_flight: usize) -> Router {
    let limiter = Arc::new(Semaphore::new(max_in_flight));
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/catalog", get(handlers::catalog))
        .route("/api/hosts", get(handlers::list_hosts).post(handlers::add_host))
        .route("/api/hosts/{id}", patch(handlers::set_host_status))
        .route("/api/halls", get(handlers::halls))
        .route("/api/slots", get(handlers::slots))
        .route("/api/book", post(handlers::book))
        .route("/api/bookings", get(handlers::list_bookings))
        .route("/api/bookings/{id}", get(handlers::get_booking))
        .with_state(engine)
        .layer(middleware::from_fn(track_metrics))
        .layer(middleware::from_fn_with_state(limiter, limit_in_flight))
        .layer(TraceLayer::new_for_http())
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(HTTP_REQUESTS_TOTAL, "route" => route.clone(), "status" => status)
        .increment(1);
    metrics::histogram!(HTTP_REQUEST_DURATION_SECONDS, "route" => route)
        .record(started.elapsed().as_secs_f64());
    response
}

async fn limit_in_flight(
    State(limiter): State<Arc<Semaphore>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(_in_flight) = InFlight::enter(limiter) else {
        tracing::warn!("request limit reached, rejecting");
        metrics::counter!(REQUESTS_REJECTED_TOTAL).increment(1);
        let body = serde_json::json!({ "error": "Server busy" });
        return (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
    };
    next.run(request).await
}

/// One admitted request. Holds its permit and the active gauge until
/// dropped, including when the client goes away mid-request.
struct InFlight {
    _permit: OwnedSemaphorePermit,
}

impl InFlight {
    fn enter(limiter: Arc<Semaphore>) -> Option<Self> {
        let permit = limiter.try_acquire_owned().ok()?;
        metrics::gauge!(REQUESTS_ACTIVE).increment(1.0);
        Some(Self { _permit: permit })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::gauge!(REQUESTS_ACTIVE).decrement(1.0);
    }
}
