use crate::config::RelayConfig;
use crate::io_struct::{AnalyzeRequest, AnalyzeResponse, MISSING_FIELDS_MESSAGE};
use crate::logging::{self, LoggingConfig};
use crate::middleware::{get_request_id, RequestIdMiddleware};
use crate::normalizer::normalize;
use crate::upstream::{UpstreamClient, UpstreamError};
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    error, get, http::StatusCode, post, web, App, HttpRequest, HttpResponse, HttpServer,
    ResponseError,
};
use log::{error, info, warn};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppState {
    pub upstream: UpstreamClient,
}

impl AppState {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(config.upstream_config())?;
        Ok(Self { upstream })
    }
}

/// Failures of `POST /analyze`, each rendered as `{ success: false, ... }`.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("{}", MISSING_FIELDS_MESSAGE)]
    MissingFields,

    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl ResponseError for AnalyzeError {
    fn status_code(&self) -> StatusCode {
        match self {
            AnalyzeError::MissingFields | AnalyzeError::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            AnalyzeError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AnalyzeError::Upstream(e) => StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(AnalyzeResponse::failure(self.to_string()))
    }
}

// Custom error handler for JSON payload errors.
fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    warn!("JSON payload error: {}", err);
    match &err {
        error::JsonPayloadError::OverflowKnownLength { length, limit } => {
            AnalyzeError::PayloadTooLarge(format!(
                "Payload too large: {} bytes exceeds limit of {} bytes",
                length, limit
            ))
            .into()
        }
        error::JsonPayloadError::Overflow { limit } => {
            AnalyzeError::PayloadTooLarge(format!("Payload exceeds limit of {} bytes", limit))
                .into()
        }
        // A body that is not JSON at all carries neither field.
        error::JsonPayloadError::ContentType => AnalyzeError::MissingFields.into(),
        _ => AnalyzeError::InvalidPayload(format!("Invalid JSON payload: {}", err)).into(),
    }
}

#[get("/")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "ok": true }))
}

#[post("/analyze")]
async fn analyze(
    req: HttpRequest,
    body: web::Json<AnalyzeRequest>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, AnalyzeError> {
    let request_id = get_request_id(&req);
    let Some((text, image_url)) = body.required_fields() else {
        warn!("[{}] Rejected analyze request: missing text or imageUrl", request_id);
        return Err(AnalyzeError::MissingFields);
    };

    info!(
        "[{}] Analyze request: {} chars of text, {} byte image reference",
        request_id,
        text.len(),
        image_url.len()
    );

    let payload = analyze_image(&app_state.upstream, &request_id, text, image_url).await?;
    Ok(HttpResponse::Ok().json(payload))
}

/// Calls the model and shapes its answer into the 200 payload.
///
/// A 2xx upstream answer without usable content is a 200 payload, not an error.
pub async fn analyze_image(
    upstream: &UpstreamClient,
    request_id: &str,
    text: &str,
    image_url: &str,
) -> Result<AnalyzeResponse, AnalyzeError> {
    let raw_text = match upstream.call(text, image_url).await {
        Ok(raw_text) => raw_text,
        Err(UpstreamError::MissingContent { raw }) => {
            warn!("[{}] Upstream response has no content", request_id);
            return Ok(AnalyzeResponse::no_content(raw));
        }
        Err(e) => {
            error!("[{}] Upstream API error: {}", request_id, e);
            return Err(AnalyzeError::Upstream(e));
        }
    };

    let normalized = normalize(&raw_text);
    if !normalized.parsed_ok {
        warn!("[{}] Model output was not a JSON array", request_id);
        return Ok(AnalyzeResponse::not_an_array(raw_text));
    }

    info!(
        "[{}] Normalized {} steps, final answer: {:?}",
        request_id,
        normalized.steps.len(),
        normalized.final_answer
    );
    Ok(AnalyzeResponse::analyzed(
        normalized.steps,
        normalized.final_answer,
        raw_text,
    ))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(AnalyzeResponse::failure("Not found"))
}

/// Builds the relay application; shared by [`startup`] and tests.
pub fn build_app(
    app_state: web::Data<AppState>,
    max_payload_size: usize,
    request_id_headers: Vec<String>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(RequestIdMiddleware::new(request_id_headers))
        .wrap(actix_web::middleware::Logger::default())
        .app_data(app_state)
        .app_data(
            web::JsonConfig::default()
                .limit(max_payload_size)
                .error_handler(json_error_handler),
        )
        .app_data(web::PayloadConfig::default().limit(max_payload_size))
        .service(health)
        .service(analyze)
        .default_service(web::route().to(not_found))
}

pub async fn startup(config: RelayConfig) -> std::io::Result<()> {
    logging::init_logging(LoggingConfig::from_level_name(config.log_level.as_deref()));

    let app_state = AppState::new(&config).map_err(std::io::Error::other)?;
    let app_state = web::Data::new(app_state);

    info!("🚧 Upstream endpoint: {}", config.upstream_url);
    info!("🚧 Model: {}", config.model);
    info!("🚧 Request timeout: {}s", config.request_timeout_secs);
    info!(
        "🚧 Max payload size: {} MB",
        config.max_payload_size / (1024 * 1024)
    );

    let max_payload_size = config.max_payload_size;
    let request_id_headers = config.request_id_headers.clone();
    let server = HttpServer::new(move || {
        build_app(
            app_state.clone(),
            max_payload_size,
            request_id_headers.clone(),
        )
    })
    .bind((config.host.as_str(), config.port));

    let server = match server {
        Ok(server) => server,
        Err(e) => {
            error!("Server error: {}", e);
            if e.kind() == std::io::ErrorKind::AddrInUse {
                error!(
                    "Port {} already in use. Try another --port or stop the running process.",
                    config.port
                );
            }
            return Err(e);
        }
    };

    info!("✅ Server listening at http://{}:{}", config.host, config.port);
    server.run().await
}
