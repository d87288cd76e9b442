pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{routing::get, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{device::DeviceStatusStore, sensors::SensorRecorder};
use handlers::ApiDoc;

/// Shared by every handler. Both services only hold the pool handle, so
/// cloning per request is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    pub sensors: SensorRecorder,
    pub device: DeviceStatusStore,
}

impl AppState {
    pub fn new(pool: PgPool, device_status_id: &str) -> Self {
        Self {
            sensors: SensorRecorder::new(pool.clone()),
            device: DeviceStatusStore::new(pool, device_status_id),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/", get(handlers::welcome))
        .route(
            "/sensor-data",
            get(handlers::list_sensor_data).post(handlers::create_sensor_data),
        )
        .route(
            "/device-status",
            get(handlers::get_device_status).post(handlers::set_device_status),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
}
