//! # claimrelay: Claims Document Relay
//!
//! `claimrelay` sits between the claims web client, a blob store holding claim attachments, and
//! an external extraction API that turns a claim's PDFs into structured data.
//!
//! ## What It Does
//!
//! - **Upload relay** (`POST /files`): streams multipart file parts into the blob store, tagged
//!   with the claim they belong to, and returns the generated file ids in part order.
//! - **Download relay** (`GET /files/{id}`): streams stored bytes back unmodified, inline or as an
//!   attachment.
//! - **Batch processing relay** (`POST /claims/{claim_id}/process`): looks up the claim's files
//!   (up to three by default), streams them to the extraction API as one multipart request and
//!   returns its JSON response unchanged.
//! - **Client facade** ([`client`]): the typed Rust client the UI layer uses, with failover
//!   across relay candidates, a single retry policy and an explicit offline mode.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). File content lives behind the
//! [`db::handlers::BlobStore`] trait, implemented for PostgreSQL (chunked rows) and a local
//! directory. The store is built once in [`Application::new`], shared through [`AppState`], and
//! closed when [`Application::serve`] returns.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use claimrelay::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = claimrelay::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     claimrelay::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod extraction;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::config::CorsOrigin;
use crate::db::handlers::{BlobStore, create_blob_store};
use crate::extraction::ExtractionClient;
use crate::openapi::ApiDoc;
use axum::extract::DefaultBodyLimit;
use axum::http::{self, HeaderValue};
use axum::{
    Router,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .store(store)
///     .config(config)
///     .extraction(extraction)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub config: Config,
    pub extraction: ExtractionClient,
}

/// Get the blob store migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    let allow_origin = if cors_config.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a path; Url always renders one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::DELETE])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials)
        .expose_headers([http::header::CONTENT_DISPOSITION, http::header::CONTENT_LENGTH]);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the router with all endpoints and middleware: API routes, docs at `/docs`,
/// optional Prometheus metrics, CORS, and request tracing.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;
    let enable_metrics = state.config.enable_metrics;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(
            "/files",
            // Size is enforced per file while streaming
            post(api::handlers::files::upload_files).layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/files/{file_id}",
            get(api::handlers::files::download_file).delete(api::handlers::files::delete_file),
        )
        .route("/files/{file_id}/metadata", get(api::handlers::files::get_file_metadata))
        .route("/claims/{claim_id}/files", get(api::handlers::claims::list_claim_files))
        .route("/claims/{claim_id}/process", post(api::handlers::claims::process_claim))
        .route("/config", get(api::handlers::config::get_config))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let mut router = router.layer(cors_layer);

    if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The relay server.
///
/// 1. **Create**: [`Application::new`] connects the blob store (running migrations for postgres)
///    and builds the router
/// 2. **Serve**: [`Application::serve`] binds the configured address and handles requests
/// 3. **Shutdown**: once the shutdown future resolves, in-flight requests finish, then the store
///    is closed and telemetry flushed
pub struct Application {
    router: Router,
    store: Arc<dyn BlobStore>,
    config: Config,
}

impl Application {
    /// Create a new application instance, connecting the configured blob store
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting claims relay with configuration: {:#?}", config);

        let store = create_blob_store(&config.store).await?;
        Self::new_with_store(config, store)
    }

    /// Create an application around an already-connected store
    pub fn new_with_store(config: Config, store: Arc<dyn BlobStore>) -> anyhow::Result<Self> {
        let extraction = ExtractionClient::new(&config.extraction)?;
        info!("Extraction API: {}", extraction.url());

        let app_state = AppState::builder()
            .store(store.clone())
            .config(config.clone())
            .extraction(extraction)
            .build();

        let router = build_router(app_state)?;

        Ok(Self { router, store, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// The fully layered router, for serving on a listener of the caller's choosing
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Claims relay listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing blob store...");
        self.store.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
