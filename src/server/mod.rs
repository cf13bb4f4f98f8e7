//! Micropub HTTP endpoint

mod request;

pub use request::{parse_body, resolve_action, ActionKind, MicropubAction, RequestError};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::content::PostId;
use crate::error::StoreError;
use crate::events::{self, EventSender, PostEvent, PostEventKind};
use crate::store::ContentStore;
use crate::Micropub;

/// Shared handler state
pub struct AppState {
    pub store: Arc<ContentStore>,
    pub events: EventSender,
}

/// Errors returned by the Micropub handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Request(RequestError::UnsupportedMediaType(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ApiError::Request(RequestError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Format(_))
            | ApiError::Store(StoreError::Backend(_))
            | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Micropub request failed: {}", self);
        } else {
            tracing::debug!("Micropub request rejected ({}): {}", status, self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Build the Micropub router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/micropub",
            post(handle_post).put(handle_put).delete(handle_delete),
        )
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Micropub server
pub async fn start(app: &Micropub, ip: &str, port: u16) -> Result<()> {
    let store = Arc::new(app.store());
    store.initialize()?;

    let (events, rx) = events::channel(app.config.events.capacity);
    tokio::spawn(events::log_events(rx));

    let state = Arc::new(AppState { store, events });
    let router = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Micropub endpoint running at http://{}:{}/micropub", ip, port);
    println!("Storing posts in {:?}", app.repo_dir);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    dispatch(&state, &headers, &body, None).await
}

async fn handle_put(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    dispatch(&state, &headers, &body, Some(ActionKind::Update)).await
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    dispatch(&state, &headers, &body, Some(ActionKind::Delete)).await
}

async fn dispatch(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    forced: Option<ActionKind>,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let document = parse_body(content_type, body)?;
    let action = resolve_action(&document, forced)?;
    let store = Arc::clone(&state.store);

    match action {
        MicropubAction::Create(properties) => {
            let id = tokio::task::spawn_blocking(move || store.create(&properties)).await??;
            let url = id.to_string();
            state
                .events
                .emit(PostEvent::new(PostEventKind::Create, url.clone()));

            Ok((
                StatusCode::CREATED,
                [(header::LOCATION, url)],
                "Post created successfully",
            )
                .into_response())
        }
        MicropubAction::Update { url, directives } => {
            let target = url.clone();
            tokio::task::spawn_blocking(move || store.update(&target, &directives)).await??;
            state
                .events
                .emit(PostEvent::new(PostEventKind::Update, event_url(&url)));

            Ok((StatusCode::OK, "Post updated successfully").into_response())
        }
        MicropubAction::Delete { url } => {
            let target = url.clone();
            tokio::task::spawn_blocking(move || store.delete(&target)).await??;
            state
                .events
                .emit(PostEvent::new(PostEventKind::Delete, event_url(&url)));

            Ok((StatusCode::OK, "Post deleted successfully").into_response())
        }
    }
}

/// Canonical `/{identifier}` form of a request URL
fn event_url(url: &str) -> String {
    PostId::parse(url)
        .map(|id| id.to_string())
        .unwrap_or_else(|_| url.to_string())
}
