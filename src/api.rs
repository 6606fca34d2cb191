//! HTTP and WebSocket surface of the packing service.
//!
//! Viewers talk to the session over `/ws`. Everything else is plain HTTP:
//! the embedded viewer page, the truck assets on disk, a manual trigger for
//! the packer and the OpenAPI description.

use std::path::Path;
use std::sync::OnceLock;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::{
    Json, Router,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

use crate::bridge::{BridgeError, ExternalPacker, PackerOutput};
use crate::config::ApiConfig;
use crate::model::PackerDimensions;
use crate::protocol::parse_client_event;
use crate::session::SessionHandle;

/// Fixed triple used by the manual packer trigger.
const TEST_DIMENSIONS: PackerDimensions = PackerDimensions::new(1200, 1380, 2800);

#[derive(Clone)]
pub struct ApiState {
    pub session: SessionHandle,
    pub packer: ExternalPacker,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded viewer page
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// Outcome of a manual packer run.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PackerTestResponse {
    Success { output: String },
    Error { error: String },
}

impl From<Result<PackerOutput, BridgeError>> for PackerTestResponse {
    fn from(result: Result<PackerOutput, BridgeError>) -> Self {
        match result {
            Ok(output) => PackerTestResponse::Success {
                output: output.stdout,
            },
            Err(err) => PackerTestResponse::Error {
                error: err.relay_message(),
            },
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(run_packing_algorithm_test),
    components(schemas(PackerTestResponse)),
    tags((name = "packing", description = "External packer"))
)]
struct ApiDoc;

/// Builds the application router.
pub fn router(state: ApiState, asset_dir: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/run_packing_algorithm_test", get(run_packing_algorithm_test))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .nest_service("/truck", ServeDir::new(asset_dir))
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the configured address and serves until the server stops.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let app = router(state, config.asset_dir());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        tracing::error!(%addr, error = %err, "could not bind server");
        err
    })?;

    tracing::info!(
        "server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        tracing::info!("local access: http://localhost:{}", config.port());
    }
    tracing::info!(
        asset_dir = %config.asset_dir().display(),
        "routes: /ws, /run_packing_algorithm_test, /truck/*, /docs/openapi.json"
    );

    axum::serve(listener, app).await
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.session))
}

/// Pumps one viewer connection.
///
/// Joining queues the current snapshot as the first outbound frame. The
/// socket is closed once the session stops feeding this viewer.
async fn handle_socket(socket: WebSocket, session: SessionHandle) {
    let viewer = match session.join().await {
        Ok(viewer) => viewer,
        Err(err) => {
            tracing::warn!(error = %err, "refusing viewer");
            return;
        }
    };
    let viewer_id = viewer.id();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    tracing::info!(viewer = viewer_id, "WebSocket connection established");

    let mut send_task = tokio::spawn(async move {
        let mut outbound = viewer.into_stream();
        while let Some(event) = outbound.next().await {
            let json = match serde_json::to_string(event.as_ref()) {
                Ok(json) => json,
                Err(err) => {
                    tracing::error!(viewer = viewer_id, error = %err, "could not encode event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
        tracing::info!(viewer = viewer_id, "viewer dropped by session, closing socket");
        let _ = ws_sender.send(Message::Close(None)).await;
    });

    let inbound = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            let queued = match result {
                Ok(Message::Text(text)) => match parse_client_event(text.as_str()) {
                    Ok(event) => inbound.submit(viewer_id, event).await,
                    Err(error) => inbound.reject(viewer_id, error).await,
                },
                Ok(Message::Close(_)) => {
                    tracing::info!(viewer = viewer_id, "WebSocket closed by client");
                    break;
                }
                Err(err) => {
                    tracing::warn!(viewer = viewer_id, error = %err, "WebSocket error");
                    break;
                }
                _ => Ok(()),
            };
            if let Err(err) = queued {
                tracing::debug!(viewer = viewer_id, error = %err, "dropping inbound frame");
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    if let Err(err) = session.leave(viewer_id).await {
        tracing::debug!(viewer = viewer_id, error = %err, "session gone before viewer left");
    }
}

/// Runs the packer once with the fixed truck dimensions.
#[utoipa::path(
    get,
    path = "/run_packing_algorithm_test",
    responses(
        (status = 200, description = "Packer output or the reason it failed", body = PackerTestResponse)
    ),
    tag = "packing"
)]
async fn run_packing_algorithm_test(State(state): State<ApiState>) -> Json<PackerTestResponse> {
    let result = state.packer.run(TEST_DIMENSIONS).await;
    if let Err(err) = &result {
        tracing::warn!(error = %err, "manual packer run failed");
    }
    Json(PackerTestResponse::from(result))
}

async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}
