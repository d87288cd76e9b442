use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

use super::{
    dto::{
        DeviceStatusDto, DeviceStatusRequest, DeviceStatusSaved, MessageResponse,
        SensorDataRequest, SensorDataSaved, SensorReadingDto,
    },
    errors::AppError,
    AppState,
};
use crate::sensors::ReadingFilter;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Optional narrowing of `GET /sensor-data`. With no parameters every reading
/// is returned.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReadingQuery {
    /// Start of time range (RFC3339, inclusive).
    pub from: Option<DateTime<Utc>>,
    /// End of time range (RFC3339, inclusive).
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of readings to return (capped at 1000).
    pub limit: Option<u32>,
    /// Number of readings to skip.
    pub offset: Option<u32>,
}

impl From<ReadingQuery> for ReadingFilter {
    fn from(q: ReadingQuery) -> Self {
        Self {
            from: q.from,
            to: q.to,
            limit: q.limit,
            offset: q.offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Welcome message", body = MessageResponse),
    ),
    tag = "system"
)]
pub async fn welcome() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "welcome to sensor server".to_owned(),
    })
}

/// List stored sensor readings, oldest first.
#[utoipa::path(
    get,
    path = "/sensor-data",
    params(ReadingQuery),
    responses(
        (status = 200, description = "Sensor readings", body = Vec<SensorReadingDto>),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn list_sensor_data(
    State(state): State<AppState>,
    query: Result<Query<ReadingQuery>, QueryRejection>,
) -> Result<Json<Vec<SensorReadingDto>>, AppError> {
    let Query(query) = query.map_err(AppError::invalid_query)?;
    let rows = state.sensors.list(&query.into()).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// Store one reading stamped with server time and a fresh id.
#[utoipa::path(
    post,
    path = "/sensor-data",
    request_body = SensorDataRequest,
    responses(
        (status = 200, description = "Reading saved", body = SensorDataSaved),
        (status = 400, description = "Missing or malformed field"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn create_sensor_data(
    State(state): State<AppState>,
    payload: Result<Json<SensorDataRequest>, JsonRejection>,
) -> Result<Json<SensorDataSaved>, AppError> {
    let Json(payload) = payload.map_err(AppError::invalid_body)?;
    let (temperature, humidity) = payload.validate().map_err(AppError::BadRequest)?;

    let reading = state.sensors.record(temperature, humidity).await?;

    Ok(Json(SensorDataSaved {
        message: "sensor data saved".to_owned(),
        data: reading.into(),
    }))
}

/// Fetch the device status, creating the default record on first access.
#[utoipa::path(
    get,
    path = "/device-status",
    responses(
        (status = 200, description = "Current device status", body = DeviceStatusDto),
        (status = 500, description = "Internal server error"),
    ),
    tag = "device"
)]
pub async fn get_device_status(
    State(state): State<AppState>,
) -> Result<Json<DeviceStatusDto>, AppError> {
    let status = state.device.get().await?;
    Ok(Json(status.into()))
}

/// Overwrite the device status. Omitted fields are stored as `false`.
#[utoipa::path(
    post,
    path = "/device-status",
    request_body = DeviceStatusRequest,
    responses(
        (status = 200, description = "Device status saved", body = DeviceStatusSaved),
        (status = 400, description = "Malformed JSON body"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "device"
)]
pub async fn set_device_status(
    State(state): State<AppState>,
    payload: Result<Json<DeviceStatusRequest>, JsonRejection>,
) -> Result<Json<DeviceStatusSaved>, AppError> {
    let Json(payload) = payload.map_err(AppError::invalid_body)?;

    let status = state
        .device
        .set(payload.is_on, payload.wifi_connected)
        .await?;

    Ok(Json(DeviceStatusSaved {
        message: "device status saved".to_owned(),
        data: status.into(),
    }))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        welcome,
        list_sensor_data,
        create_sensor_data,
        get_device_status,
        set_device_status,
        health
    ),
    components(schemas(
        MessageResponse,
        SensorDataRequest,
        SensorReadingDto,
        SensorDataSaved,
        DeviceStatusRequest,
        DeviceStatusDto,
        DeviceStatusSaved
    )),
    tags(
        (name = "sensors", description = "Sensor reading endpoints"),
        (name = "device",  description = "Device status endpoints"),
        (name = "system",  description = "System endpoints"),
    ),
    info(
        title = "Sensor Server API",
        version = "0.1.0",
        description = "Sensor telemetry ingestion and device status"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::{TestResponse, TestServer};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use sqlx::PgPool;

    use crate::api::{
        dto::{DeviceStatusSaved, SensorDataSaved},
        router, AppState,
    };

    const DEVICE_ID: &str = "6557b0290fdad606e4a12adb";

    fn test_server(pool: PgPool) -> TestServer {
        TestServer::new(router(AppState::new(pool, DEVICE_ID))).unwrap()
    }

    async fn post_reading(server: &TestServer, temperature: f64, humidity: f64) -> SensorDataSaved {
        let resp = server
            .post("/sensor-data")
            .json(&json!({ "temperature": temperature, "humidity": humidity }))
            .await;
        resp.assert_status_ok();
        resp.json()
    }

    async fn reading_count(server: &TestServer) -> usize {
        let resp = server.get("/sensor-data").await;
        resp.assert_status_ok();
        resp.json::<Vec<Value>>().len()
    }

    // -----------------------------------------------------------------------
    // GET /
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn root_returns_welcome(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/").await;
        resp.assert_status_ok();
        resp.assert_json(&json!({ "message": "welcome to sensor server" }));
    }

    // -----------------------------------------------------------------------
    // POST /sensor-data
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn post_reading_echoes_values_with_fresh_id(pool: PgPool) {
        let server = test_server(pool);
        // Postgres keeps microseconds, so allow for rounding of the stored time.
        let before = Utc::now() - Duration::microseconds(1);

        let first = post_reading(&server, 23.4, 51.2).await;
        assert_eq!(first.message, "sensor data saved");
        assert_eq!(first.data.temperature, 23.4);
        assert_eq!(first.data.humidity, 51.2);
        assert!(first.data.updated_at >= before);

        let second = post_reading(&server, 23.4, 51.2).await;
        assert_ne!(first.data.id, second.data.id);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn post_reading_accepts_negative_and_zero(pool: PgPool) {
        let server = test_server(pool);
        let saved = post_reading(&server, -12.5, 0.0).await;
        assert_eq!(saved.data.temperature, -12.5);
        assert_eq!(saved.data.humidity, 0.0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn post_reading_missing_field_is_rejected_without_write(pool: PgPool) {
        let server = test_server(pool);

        let resp = server
            .post("/sensor-data")
            .json(&json!({ "temperature": 20.0 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["error"], "humidity is required");

        let resp = server
            .post("/sensor-data")
            .json(&json!({ "humidity": 40.0 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(reading_count(&server).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn post_reading_non_numeric_is_rejected(pool: PgPool) {
        let server = test_server(pool);
        let resp = server
            .post("/sensor-data")
            .json(&json!({ "temperature": "warm", "humidity": 40.0 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert!(body["error"].is_string());
        assert_eq!(reading_count(&server).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn post_reading_malformed_body_is_rejected(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.post("/sensor-data").text("temperature=20").await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(reading_count(&server).await, 0);
    }

    // -----------------------------------------------------------------------
    // GET /sensor-data
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn list_returns_every_posted_reading(pool: PgPool) {
        let server = test_server(pool);
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(post_reading(&server, 20.0 + f64::from(i), 50.0).await.data.id);
        }

        let resp = server.get("/sensor-data").await;
        resp.assert_status_ok();
        let body: Vec<Value> = resp.json();
        assert_eq!(body.len(), ids.len());
        for id in &ids {
            assert!(body.iter().any(|r| r["id"] == id.to_string()));
        }
        assert!(body[0].get("updated_at").is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_empty_returns_empty_array(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/sensor-data").await;
        resp.assert_status_ok();
        resp.assert_json(&json!([]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_honours_limit_and_offset(pool: PgPool) {
        let server = test_server(pool);
        for i in 0..5 {
            post_reading(&server, f64::from(i), 50.0).await;
        }

        let resp = server
            .get("/sensor-data")
            .add_query_param("limit", 2)
            .add_query_param("offset", 4)
            .await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<Vec<Value>>().len(), 1);

        let resp = server.get("/sensor-data").add_query_param("limit", 3).await;
        assert_eq!(resp.json::<Vec<Value>>().len(), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_with_future_from_is_empty(pool: PgPool) {
        let server = test_server(pool);
        post_reading(&server, 20.0, 50.0).await;

        let from = (Utc::now() + Duration::hours(1)).format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let resp = server.get("/sensor-data").add_query_param("from", from).await;
        resp.assert_status_ok();
        resp.assert_json(&json!([]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn list_bad_query_is_rejected(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/sensor-data").add_query_param("limit", -1).await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        let resp = server.get("/sensor-data").add_query_param("from", "yesterday").await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    // -----------------------------------------------------------------------
    // GET/POST /device-status
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn first_get_creates_default_status_once(pool: PgPool) {
        let server = test_server(pool);

        let resp = server.get("/device-status").await;
        resp.assert_status_ok();
        let first: Value = resp.json();
        assert_eq!(first["id"], DEVICE_ID);
        assert_eq!(first["is_on"], false);
        assert_eq!(first["wifi_connected"], false);

        let second: Value = server.get("/device-status").await.json();
        assert_eq!(first, second);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn post_then_get_returns_posted_values(pool: PgPool) {
        let server = test_server(pool);

        let resp = server
            .post("/device-status")
            .json(&json!({ "is_on": true, "wifi_connected": true }))
            .await;
        resp.assert_status_ok();
        let saved: DeviceStatusSaved = resp.json();
        assert_eq!(saved.message, "device status saved");
        assert_eq!(saved.data.id, DEVICE_ID);
        assert!(saved.data.is_on);
        assert!(saved.data.wifi_connected);

        let current: Value = server.get("/device-status").await.json();
        assert_eq!(current["is_on"], true);
        assert_eq!(current["wifi_connected"], true);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn second_post_fully_overwrites_first(pool: PgPool) {
        let server = test_server(pool);

        server
            .post("/device-status")
            .json(&json!({ "is_on": true, "wifi_connected": true }))
            .await
            .assert_status_ok();

        let resp = server
            .post("/device-status")
            .json(&json!({ "wifi_connected": true }))
            .await;
        resp.assert_status_ok();
        let saved: DeviceStatusSaved = resp.json();
        assert!(!saved.data.is_on);
        assert!(saved.data.wifi_connected);

        let current: Value = server.get("/device-status").await.json();
        assert_eq!(current["is_on"], false);
        assert_eq!(current["wifi_connected"], true);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn post_device_status_malformed_body_is_rejected(pool: PgPool) {
        let server = test_server(pool);
        let resp = server
            .post("/device-status")
            .json(&json!({ "is_on": "yes" }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    // -----------------------------------------------------------------------
    // Database failures
    // -----------------------------------------------------------------------

    fn assert_json_500(resp: TestResponse) {
        resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.header("content-type"), "application/json");
        let body: Value = resp.json();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("database error:"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn missing_tables_surface_as_json_500(pool: PgPool) {
        sqlx::query("DROP TABLE sensor_readings, device_status")
            .execute(&pool)
            .await
            .unwrap();
        let server = test_server(pool);

        assert_json_500(server.get("/sensor-data").await);
        assert_json_500(
            server
                .post("/sensor-data")
                .json(&json!({ "temperature": 20.0, "humidity": 50.0 }))
                .await,
        );
        assert_json_500(server.get("/device-status").await);
        assert_json_500(
            server
                .post("/device-status")
                .json(&json!({ "is_on": true, "wifi_connected": true }))
                .await,
        );
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_path_returns_json_404(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/does-not-exist").await;
        resp.assert_status(StatusCode::NOT_FOUND);
        resp.assert_json(&json!({ "error": "endpoint not found" }));
        assert_eq!(resp.header("content-type"), "application/json");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unsupported_method_returns_json_404(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.delete("/sensor-data").await;
        resp.assert_status(StatusCode::NOT_FOUND);
        resp.assert_json(&json!({ "error": "endpoint not found" }));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn health_returns_ok(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn openapi_spec_is_served(pool: PgPool) {
        let server = test_server(pool);
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Sensor Server API");
        assert!(body["paths"]["/device-status"].is_object());
    }
}
