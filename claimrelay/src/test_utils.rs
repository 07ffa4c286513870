//! Test utilities for integration testing (available with `test-utils` feature).

use crate::config::{Config, ExtractionConfig, StoreConfig};
use axum_test::TestServer;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use url::Url;

static CRYPTO_PROVIDER: Once = Once::new();

/// reqwest is built without a bundled TLS provider; install one before creating clients
pub fn install_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        // Already installed by another caller in this process is fine
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Config backed by a local store under `store_path`. The extraction URL points at a closed
/// port; tests that relay to the extraction API override it with a mock server's address.
pub fn create_test_config(store_path: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        store: StoreConfig::Local {
            path: store_path.to_path_buf(),
        },
        extraction: ExtractionConfig {
            url: Url::parse("http://127.0.0.1:9/process-pdfs").expect("valid test URL"),
            timeout: Some(Duration::from_secs(10)),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub async fn create_test_app(config: Config) -> TestServer {
    install_crypto_provider();

    let app = crate::Application::new(config)
        .await
        .expect("Failed to create application");

    app.into_test_server()
}
