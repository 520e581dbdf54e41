use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::json;
use snaplist_api_rs::{
    config::AppConfig,
    ebay::{
        self, DraftInputs, DraftReceipt, EbayAuthError, EbayEndpoints, EbayPublishError, Publisher,
    },
    llm::OpenAiClient,
    metrics,
    models::{
        ApiError, EditRequest, ExchangeRequest, GenerateRequest, GenerateResponse, ListingRecord,
        UploadRequest, UploadResponse,
    },
    pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineErrorKind},
    session::{SessionError, SessionSnapshot, SessionStore},
    storage::ImageStore,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "snaplist.api", "server crashed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(target = "snaplist.api", "startup blocked: {err}");
            return Err(err.into());
        }
    };

    let chat = Arc::new(OpenAiClient::new(config.openai.clone()));
    let pipeline = Pipeline::new(
        chat,
        config.openai.vision_model.clone(),
        config.openai.text_model.clone(),
        PipelineConfig::from_app(&config),
    );
    let store = ImageStore::from_settings(&config.storage).await;
    let ebay = EbayEndpoints::new(config.ebay.clone());
    let sessions = SessionStore::new();
    let openapi: serde_json::Value = serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or_else(|_| json!({"openapi": "3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;

    let state = AppState {
        pipeline: Arc::new(pipeline),
        store,
        sessions,
        ebay,
        openapi: Arc::new(openapi),
        prometheus_handle,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/generate", post(generate_listing))
        .route("/sessions/{id}/listing", patch(edit_listing))
        .route("/sessions/{id}/images", post(upload_images))
        .route("/sessions/{id}/ebay/exchange", post(exchange_oauth_code))
        .route("/sessions/{id}/publish", post(publish_listing))
        .route("/ebay/oauth/url", get(oauth_url))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit_from_env()))
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "snaplist.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline<OpenAiClient>>,
    store: ImageStore,
    sessions: SessionStore,
    ebay: EbayEndpoints,
    openapi: Arc<serde_json::Value>,
    prometheus_handle: PrometheusHandle,
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
///
/// Returns a small JSON payload with `status` and `service`.
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "snaplist-api-rs",
    }))
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap()
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(StatusCode::UNAUTHORIZED);
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> axum::http::Response<String> {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Snaplist API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    axum::http::Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.to_string())
        .unwrap()
}

/// Open a new listing session.
///
/// - Method: `POST`
/// - Path: `/sessions`
async fn create_session(State(state): State<AppState>) -> Json<serde_json::Value> {
    metrics::inc_requests("/sessions");
    let id = state.sessions.create().await;
    info!(target = "snaplist.api", session_id = %id, "session_created");
    Json(json!({ "session_id": id.to_string() }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let id = parse_session_id(&id)?;
    state
        .sessions
        .snapshot(id)
        .await
        .map(Json)
        .ok_or(AppError::Session(SessionError::NotFound))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_session_id(&id)?;
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::Session(SessionError::NotFound))
    }
}

/// Run the photos → listing pipeline and keep the result on the session.
///
/// - Method: `POST`
/// - Path: `/sessions/{id}/generate`
/// - Body: `GenerateRequest` (base64 images + optional free text)
/// - Response: `GenerateResponse` (record + per-field outcome reports)
async fn generate_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    metrics::inc_requests("/sessions/generate");
    let id = parse_session_id(&id)?;
    if !state.sessions.contains(id).await {
        return Err(AppError::Session(SessionError::NotFound));
    }
    info!(
        target = "snaplist.api",
        session_id = %id,
        images = payload.images.len(),
        "listing generation invoked",
    );

    let outcome = state
        .pipeline
        .generate(&payload.images, &payload.text)
        .await
        .map_err(AppError::Pipeline)?;
    state.sessions.store_generated(id, &outcome).await;
    Ok(Json(outcome))
}

/// Apply seller edits over the generated record.
///
/// - Method: `PATCH`
/// - Path: `/sessions/{id}/listing`
async fn edit_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(edits): Json<EditRequest>,
) -> Result<Json<ListingRecord>, AppError> {
    metrics::inc_requests("/sessions/listing");
    let id = parse_session_id(&id)?;
    let record = state
        .sessions
        .apply_edits(id, &edits)
        .await
        .map_err(AppError::Session)?;
    Ok(Json(record))
}

/// Push the session's photos to object storage.
///
/// - Method: `POST`
/// - Path: `/sessions/{id}/images`
/// - Response: public URLs in input order plus the count of skipped items
async fn upload_images(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    metrics::inc_requests("/sessions/images");
    let id = parse_session_id(&id)?;
    if !state.sessions.contains(id).await {
        return Err(AppError::Session(SessionError::NotFound));
    }
    if payload.images.is_empty() {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "upload_images",
            "no images provided",
        )));
    }

    let outcome = state.store.upload_images(&payload.images).await;
    state
        .sessions
        .store_image_urls(id, outcome.urls.clone())
        .await;
    Ok(Json(UploadResponse {
        urls: outcome.urls,
        skipped: outcome.skipped,
    }))
}

async fn oauth_url(State(state): State<AppState>) -> Json<serde_json::Value> {
    metrics::inc_requests("/ebay/oauth/url");
    Json(json!({ "authorize_url": ebay::authorization_url(&state.ebay) }))
}

/// Exchange the authorization code the seller brought back from eBay.
///
/// - Method: `POST`
/// - Path: `/sessions/{id}/ebay/exchange`
async fn exchange_oauth_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ExchangeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    metrics::inc_requests("/sessions/ebay/exchange");
    let id = parse_session_id(&id)?;
    if !state.sessions.contains(id).await {
        return Err(AppError::Session(SessionError::NotFound));
    }

    let tokens = ebay::exchange_code(&state.ebay, &payload.code)
        .await
        .map_err(AppError::OAuth)?;
    state.sessions.store_tokens(id, tokens).await;
    Ok(Json(json!({ "authenticated": true })))
}

/// Create the draft listing from the session's edited record and uploaded
/// image URLs. All marketplace-specific values arrive in the body; nothing
/// is defaulted server-side.
///
/// - Method: `POST`
/// - Path: `/sessions/{id}/publish`
/// - Body: `DraftInputs`
async fn publish_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(inputs): Json<DraftInputs>,
) -> Result<Json<DraftReceipt>, AppError> {
    metrics::inc_requests("/sessions/publish");
    let id = parse_session_id(&id)?;
    let context = state
        .sessions
        .publish_context(id)
        .await
        .ok_or(AppError::Session(SessionError::NotFound))?;
    let record = context
        .record
        .ok_or(AppError::Session(SessionError::NothingGenerated))?;
    if context.image_urls.is_empty() {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "publish",
            "no uploaded images in session",
        )));
    }

    let publisher = match context.tokens {
        Some(tokens) => Publisher::authenticated(state.ebay.clone(), tokens),
        None => Publisher::new(state.ebay.clone()),
    };
    let receipt = publisher
        .create_draft(&record, &context.image_urls, &inputs)
        .await
        .map_err(AppError::Publish)?;
    info!(
        target = "snaplist.api",
        session_id = %id,
        listing_id = %receipt.listing_id,
        "draft_listing_created",
    );
    Ok(Json(receipt))
}

fn parse_session_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Session(SessionError::InvalidId))
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(25 * 1024 * 1024)
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
    Session(SessionError),
    OAuth(EbayAuthError),
    Publish(EbayPublishError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::Upstream => StatusCode::BAD_GATEWAY,
                    PipelineErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    PipelineErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    ApiError {
                        error: err.stage().to_string(),
                        detail: Some(err.detail().to_string()),
                    },
                )
            }
            AppError::Session(err) => {
                let status = match err {
                    SessionError::InvalidId => StatusCode::BAD_REQUEST,
                    SessionError::NotFound => StatusCode::NOT_FOUND,
                    SessionError::NothingGenerated => StatusCode::CONFLICT,
                };
                (
                    status,
                    ApiError {
                        error: "session".to_string(),
                        detail: Some(err.to_string()),
                    },
                )
            }
            AppError::OAuth(err) => (
                StatusCode::BAD_GATEWAY,
                ApiError {
                    error: "ebay_oauth".to_string(),
                    detail: Some(err.to_string()),
                },
            ),
            AppError::Publish(err) => {
                let status = match &err {
                    EbayPublishError::NotAuthenticated => StatusCode::CONFLICT,
                    EbayPublishError::Request(_) | EbayPublishError::Rejected { .. } => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                (
                    status,
                    ApiError {
                        error: "ebay_publish".to_string(),
                        detail: Some(err.to_string()),
                    },
                )
            }
        };
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
