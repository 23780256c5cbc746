//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, body limits, request ID, CORS, metrics)
//! - Guard ML, media and account routes with the session check
//! - Bind server to listener and drain on shutdown

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath, Request},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::auth::{require_session, IdentityProvider, LoginStates, SessionGuard, TokenStore};
use crate::config::{CorsConfig, GatewayConfig};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt, X_REQUEST_ID};
use crate::http::{account, media, ml, response};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::MlRouter;
use crate::storage::ObjectStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub ml: Arc<MlRouter>,
    pub tokens: TokenStore,
    pub login_states: LoginStates,
    pub sessions: SessionGuard,
    pub identity: Arc<dyn IdentityProvider>,
    pub objects: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        ml: MlRouter,
        identity: Arc<dyn IdentityProvider>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let tokens = TokenStore::new(Duration::from_secs(config.auth.token_ttl_secs));
        let login_states = LoginStates::new(Duration::from_secs(config.auth.login_state_ttl_secs));
        let sessions = SessionGuard::new(tokens.clone(), &config.auth);
        Self {
            config: Arc::new(config),
            ml: Arc::new(ml),
            tokens,
            login_states,
            sessions,
            identity,
            objects,
        }
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    shutdown: broadcast::Receiver<()>,
}

impl HttpServer {
    /// Create a new HTTP server over prepared state.
    pub fn new(state: AppState, shutdown: &Shutdown) -> Self {
        Self {
            router: build_router(state),
            shutdown: shutdown.subscribe(),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut shutdown = self.shutdown;
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.listener.max_body_bytes;
    let cors = cors_layer(&state.config.cors);

    let guarded = Router::new()
        .route("/ml/image", post(ml::image))
        .route("/ml/message", post(ml::message))
        .route("/ml/track", post(ml::track))
        .route("/ml/melody", post(ml::melody))
        .route("/ml/ts", post(ml::timeseries))
        .route("/images", get(media::list_images).delete(media::delete_image))
        .route("/tracks", get(media::list_tracks))
        .route("/image", post(media::upload_image))
        .route("/account", get(account::account))
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            require_session,
        ));

    let open = Router::new()
        .route("/health", get(account::health))
        .route("/login", get(account::login))
        .route("/signin", get(account::signin))
        .route("/callback", get(account::callback))
        .route("/logout", get(account::logout));

    Router::new()
        .merge(guarded)
        .merge(open)
        .route_layer(middleware::from_fn(track_metrics))
        .fallback(response::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = request.headers().request_id().unwrap_or("-"),
            )
        }))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        .layer(cors)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) if value != "*" => Some(value),
            _ => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, request_id.clone()])
        .expose_headers([request_id])
        .max_age(Duration::from_secs(config.max_age_secs))
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), &route, started);
    response
}
