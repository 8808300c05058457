//! HTTP gateway: validates and authenticates requests, then hands them to the
//! persistence workers over the dispatch bus.

pub mod auth;
pub mod error;
pub mod jwt;
pub mod rest;

use std::any::Any;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use docgate_common::{Config, Document, OperationMessage, ResourceFamily};
use docgate_dispatch::{DispatchBus, WorkerPool};
use docgate_store::DocumentStore;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::error::{message_response, ApiError, INTERNAL_ERROR};
use crate::jwt::ClaimVerifier;

pub struct AppState {
    pub config: Config,
    pub bus: Arc<DispatchBus>,
    pub verifier: ClaimVerifier,
}

impl AppState {
    /// Spawn one worker pool per resource family, register them on a fresh
    /// bus and build the shared state. Must be called inside a Tokio runtime.
    pub fn start(config: Config, store: Arc<dyn DocumentStore>) -> (Arc<Self>, Vec<WorkerPool>) {
        let mut bus = DispatchBus::new();
        let pools: Vec<WorkerPool> = ResourceFamily::ALL
            .into_iter()
            .map(|family| {
                WorkerPool::spawn(
                    &mut bus,
                    config.bus_address(family),
                    family.schema(),
                    store.clone(),
                    config.worker_pool_size,
                    config.worker_queue_depth,
                )
            })
            .collect();

        let verifier = ClaimVerifier::new(&config.jwt_secret, config.jwt_issuer.clone());
        let state = Arc::new(Self {
            config,
            bus: Arc::new(bus),
            verifier,
        });
        (state, pools)
    }

    /// Send one message to the family's workers and return the OK payload.
    ///
    /// The exchange runs on its own task, so a client that disconnects does
    /// not cancel work a worker already has.
    pub async fn dispatch(
        &self,
        family: ResourceFamily,
        message: OperationMessage,
    ) -> Result<Document, ApiError> {
        let bus = self.bus.clone();
        let address = self.config.bus_address(family).to_string();
        let timeout = self.config.dispatch_timeout;
        let kind = message.kind();

        let exchange = tokio::spawn(async move { bus.send(&address, message, timeout).await });
        let result = exchange
            .await
            .map_err(|e| ApiError::Internal(format!("dispatch task failed: {e}")))??;

        if result.is_ok() {
            Ok(result.data.unwrap_or_default())
        } else {
            Err(ApiError::Store {
                kind,
                resource_id: result.resource_id,
                message: result.message.unwrap_or_default(),
            })
        }
    }
}

/// Routes for one family, mounted under `/v1/<family>`.
fn family_routes(family: ResourceFamily) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/create",
            post(
                move |State(state): State<Arc<AppState>>,
                      headers: HeaderMap,
                      body: Result<Bytes, BytesRejection>| {
                    rest::create_resource(state, family, headers, body)
                },
            ),
        )
        .route(
            "/read",
            post(move |State(state): State<Arc<AppState>>, body: Result<Bytes, BytesRejection>| {
                rest::read_resource(state, family, body)
            }),
        )
}

/// All origins (mirrored, so credentials are allowed), POST/OPTIONS.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_credentials(true)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("access-control-allow-method"),
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        ])
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }));

    for family in ResourceFamily::ALL {
        app = app.nest(&format!("/v1/{family}"), family_routes(family));
    }

    app.with_state(state)
        // Uncaught faults: uniform 500
        .layer(CatchPanicLayer::custom(|_: Box<dyn Any + Send + 'static>| {
            tracing::error!("Handler panicked");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }))
        .layer(cors_layer())
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
