//! HTTP API: routing, access control and the generate endpoint

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, header::CONTENT_TYPE};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use axum::routing::get;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, StyleRequest};

mod middleware;
mod ratelimit;

use middleware::{rate_limit, require_access_token};
use ratelimit::RateLimiter;

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    config: Arc<AppConfig>,
    pipeline: Arc<Pipeline>,
    limiter: Arc<RateLimiter>,
    permits: Arc<Semaphore>,
}

impl AppState {
    fn new(config: AppConfig) -> Result<Self, PipelineError> {
        let pipeline = Pipeline::new(&config.upstream)?;
        Ok(Self {
            limiter: Arc::new(RateLimiter::new(config.rate_limit_per_minute)),
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateQuery {
    /// item name
    w: Option<String>,
    bgstyle: Option<String>,
}

async fn generate_handler(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> Result<Response, PipelineError> {
    let request = StyleRequest::new(
        query.w.as_deref().unwrap_or_default(),
        query.bgstyle.as_deref(),
    )?;

    let _permit = state
        .permits
        .acquire()
        .await
        .map_err(|err| PipelineError::Internal(err.to_string()))?;
    let output = state.pipeline.run(&request).await?;

    Response::builder()
        .header(CONTENT_TYPE, output.content_type)
        .body(Body::from(output.bytes))
        .map_err(PipelineError::from)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                error!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);
    Router::new()
        .route("/api/generate", get(generate_handler))
        // the last route layer runs first: token check, then rate limit
        .route_layer(from_fn_with_state(state.clone(), rate_limit))
        .route_layer(from_fn_with_state(state.clone(), require_access_token))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
    }
    info!("Shutting down");
}

/// Builds the pipeline and serves the API until ctrl-c.
pub async fn setup_server(config: AppConfig) -> Result<(), anyhow::Error> {
    let addr = format!("{}:{}", config.listen_address, config.port);
    let app = create_router(AppState::new(config)?);

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}
