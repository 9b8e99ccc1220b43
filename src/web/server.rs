//! Web server for filehost.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::config::ServerConfig;
use crate::{FilehostError, Result};

use super::handlers::AppState;
use super::router::{create_health_router, create_router};

/// HTTP server for the file API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// CORS allowed origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, app_state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| FilehostError::Config(format!("invalid server address: {e}")))?;

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            cors_origins: config.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the complete application router.
    pub fn router(&self) -> Router {
        build_app(Arc::clone(&self.app_state), &self.cors_origins)
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> std::io::Result<()> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router).await
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

/// Assemble API routes, health check and compression.
pub fn build_app(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    create_router(app_state, cors_origins)
        .merge(create_health_router())
        .layer(CompressionLayer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::file::{AdmissionMode, FileStorage, QuotaPolicy};
    use tempfile::TempDir;

    async fn create_state(temp: &TempDir) -> AppState {
        AppState::new(
            Database::open_in_memory().await.unwrap(),
            FileStorage::new(temp.path().join("uploads")).unwrap(),
            QuotaPolicy::new(1024, AdmissionMode::Snapshot),
        )
    }

    fn create_test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        }
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let temp = TempDir::new().unwrap();
        let server = WebServer::new(&create_test_config(), create_state(&temp).await).unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_web_server_invalid_address() {
        let temp = TempDir::new().unwrap();
        let config = ServerConfig {
            host: "not an address".to_string(),
            ..create_test_config()
        };

        let result = WebServer::new(&config, create_state(&temp).await);
        assert!(matches!(result, Err(FilehostError::Config(_))));
    }

    #[tokio::test]
    async fn test_web_server_run() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let temp = TempDir::new().unwrap();
        let server = WebServer::new(&create_test_config(), create_state(&temp).await).unwrap();
        let addr = server.run_with_addr().await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }
}
