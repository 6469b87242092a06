use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{debug, error, info};
use serde::Serialize;

use crate::auth::{self, Credentials};
use crate::metrics::Metrics;
use crate::pipeline::{UpdateMode, UpdateParams, UpdatePipeline};

pub struct AppState {
    pub pipeline: UpdatePipeline,
    pub metrics: Arc<Metrics>,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

pub fn create_router(state: Arc<AppState>, credentials: Credentials, secured_metrics: bool) -> Router {
    let require_auth = middleware::from_fn_with_state(Arc::new(credentials), auth::require_basic_auth);

    let updates = Router::new()
        .route("/nic/update", get(update_single))
        .route("/nic/bulk/update", get(update_bulk))
        .route_layer(require_auth.clone());

    let metrics = Router::new().route("/metrics", get(metrics_export));
    let metrics = if secured_metrics {
        metrics.route_layer(require_auth)
    } else {
        metrics
    };

    Router::new()
        .merge(updates)
        .merge(metrics)
        .route("/health", get(health_check))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let uri = request.uri();
    let path = match uri.query() {
        Some(q) => format!("{}?{}", uri.path(), q),
        None => uri.path().to_string(),
    };
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("-").trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let duration = start.elapsed();

    // method path "user-agent" ip status length duration
    info!(
        target: "access",
        "{} {} \"{}\" {} {} {} {:.3}ms",
        method, path, user_agent, ip, status, length, duration.as_secs_f64() * 1000.0
    );

    response
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK"
    }))
}

async fn metrics_export(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.record_request("/metrics");

    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Error encoding metrics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error encoding metrics")
        }
    }
}

async fn update_single(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateParams>,
) -> Response {
    state.metrics.record_request("/nic/update");
    run_update(&state, UpdateMode::Single, params).await
}

async fn update_bulk(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateParams>,
) -> Response {
    state.metrics.record_request("/nic/bulk/update");
    run_update(&state, UpdateMode::Bulk, params).await
}

async fn run_update(state: &AppState, mode: UpdateMode, params: UpdateParams) -> Response {
    debug!("{:?} update request: {:?}", mode, params);

    match state.pipeline.run(mode, &params).await {
        Ok(response) => {
            let status = if response.is_single_failure() {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::OK
            };
            json_response(status, &response)
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => (status, [(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!("Error encoding response: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error encoding response")
        }
    }
}

fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.to_string(),
        }),
    )
        .into_response()
}
