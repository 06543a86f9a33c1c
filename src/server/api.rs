use crate::models::chat::{ default_models, ModelInfo };
use crate::models::relay::RelayRequest;
use crate::relay::{ Relay, RelayError };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    body::{ Body, Bytes },
    extract::State,
    response::{ IntoResponse, Response },
    http::{ header::CONTENT_TYPE, StatusCode },
    Json,
};
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn };

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    relay: Arc<Relay>,
    models: Arc<Vec<ModelInfo>>,
}

impl AppState {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            models: Arc::new(default_models()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), [(CONTENT_TYPE, TEXT_PLAIN)], self.public_message()).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/models", get(models_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn serve_http(
    addr: SocketAddr,
    app: Router
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
        format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
    )?;
    info!("HTTP server listening on: http://{}", addr);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

pub async fn serve_https(
    addr: SocketAddr,
    app: Router,
    cert_path: &str,
    key_path: &str
) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
    let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
        cert_path,
        key_path
    ).await?;

    info!("HTTPS server listening on: https://{}", addr);
    axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
    Ok(())
}

/// Takes the raw body so a malformed document is answered in plain text like
/// every other relay error.
async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match serde_json::from_slice::<RelayRequest>(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!("Rejected malformed chat request: {}", e);
            return RelayError::InvalidRequest(e.to_string()).into_response();
        }
    };

    match state.relay.stream(request).await {
        Ok(stream) =>
            (StatusCode::OK, [(CONTENT_TYPE, TEXT_PLAIN)], Body::from_stream(stream)).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn models_handler(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(state.models.as_ref().clone())
}

async fn health_handler() -> &'static str {
    "ok"
}
