use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use facial_match::config::Settings;
use facial_match::core::{Matcher, RecordStore, RegistrationOracle, SessionBuilder};
use facial_match::models::Pricing;
use facial_match::routes::{self, flows::AppState};
use facial_match::services::{ArtifactSink, DirectorySink, FlowService, FlowServiceOptions, SimulatedLatency};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle path errors such as malformed flow ids
pub fn handle_path_error(err: error::PathError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_path".to_string(),
        message: format!("Invalid path: {}", err),
        status_code: 404,
    }
    .into()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Configuration first so the [logging] section can shape the subscriber
    let loaded = Settings::load();
    let logging = loaded
        .as_ref()
        .map(|settings| settings.logging.clone())
        .unwrap_or_default()
        .with_env_overrides();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&logging.level))
        .with_target(false)
        .with_level(true);

    match logging.format.as_str() {
        "pretty" => subscriber.pretty().init(),
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }

    info!("Starting Facial Match service...");

    let settings = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    info!("Configuration loaded successfully");

    // Record store
    let store = match &settings.records.path {
        Some(path) => RecordStore::from_json_file(path).map_err(|e| {
            error!("Failed to load records from {}: {}", path.display(), e);
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?,
        None => RecordStore::builtin(),
    };
    let store = Arc::new(store);

    info!("Record store ready with {} records", store.len());

    let latency = &settings.latency;
    let matcher = Matcher::new(
        store.clone(),
        settings.matching.similarity_threshold,
        SimulatedLatency::from_millis(latency.match_run_ms),
    );
    let oracle = RegistrationOracle::new(store, SimulatedLatency::from_millis(latency.registration_check_ms));
    let sessions = SessionBuilder::new(
        Pricing::from(&settings.pricing),
        &settings.payment.merchant_name,
        &settings.payment.merchant_city,
    );

    info!(
        "Matcher initialized with threshold {}% and total price {}",
        matcher.threshold(),
        facial_match::models::format_cents(sessions.pricing().total_cents())
    );

    let options = FlowServiceOptions {
        max_flows: settings.flows.max_flows,
        idle_ttl: Duration::from_secs(settings.flows.idle_ttl_secs),
        match_run_timeout: Duration::from_millis(latency.match_run_timeout_ms),
        payment_latency: SimulatedLatency::from_millis(latency.payment_confirmation_ms),
        seed: settings.random.seed,
        sink: settings.artifacts.output_dir.as_ref().map(|dir| {
            info!("Downloads will also be written to {}", dir.display());
            Arc::new(DirectorySink::new(dir)) as Arc<dyn ArtifactSink>
        }),
    };

    let flows = FlowService::new(matcher, oracle, sessions, options);

    // Build application state
    let app_state = AppState { flows };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);
    let max_upload_bytes = settings.server.max_upload_bytes;

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
