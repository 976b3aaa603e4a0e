//! HTTP server exposing manual VOD recovery.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use vod_recovery::VodUrlRecoveryEngine;

use crate::api::routes;
use crate::config::ServerConfig;
use crate::error::{AppError, Result};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub start_time: Instant,
    pub engine: Arc<VodUrlRecoveryEngine>,
}

impl AppState {
    pub fn new(engine: VodUrlRecoveryEngine) -> Self {
        Self {
            start_time: Instant::now(),
            engine: Arc::new(engine),
        }
    }
}

pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub fn build_router(&self) -> Router {
        routes::router()
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind address as a socket address. IPv6 literals may be bracketed.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let host = self.config.bind_address.trim();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let ip: IpAddr = host.parse().map_err(|e| {
            AppError::InvalidInput(format!("Invalid address `{}`: {e}", self.config.bind_address))
        })?;
        Ok(SocketAddr::new(ip, self.config.port))
    }

    /// Serve until ctrl-c.
    pub async fn run(self) -> Result<()> {
        let addr = self.socket_addr()?;

        let router = self.build_router();
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("API server listening on http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| AppError::Server(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use vod_recovery::RecoveryConfig;

    fn server() -> ApiServer {
        server_at("127.0.0.1", 5000)
    }

    fn server_at(bind_address: &str, port: u16) -> ApiServer {
        let engine = VodUrlRecoveryEngine::new(RecoveryConfig::default()).unwrap();
        let config = ServerConfig {
            bind_address: bind_address.to_string(),
            port,
        };
        ApiServer::new(config, AppState::new(engine))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let response = server()
            .build_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let response = server().build_router().oneshot(post("not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn non_numeric_id_is_rejected() {
        let response = server()
            .build_router()
            .oneshot(post(
                r#"{"streamer_name":"camila","stream_id":"abc","timestamp":"2024-02-03 00:01:31"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn old_broadcast_is_reported_stale() {
        let response = server()
            .build_router()
            .oneshot(post(
                r#"{"streamer_name":"camila","stream_id":"43549753755","timestamp":"2020-01-01 00:00:00"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "stale_broadcast");
        assert_eq!(body["retention_days"], 60);
    }

    #[test]
    fn bind_address_accepts_both_families() {
        let v4 = server_at("127.0.0.1", 5000).socket_addr().unwrap();
        assert_eq!(v4, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());

        let v6 = server_at("::1", 8080).socket_addr().unwrap();
        assert_eq!(v6, "[::1]:8080".parse::<SocketAddr>().unwrap());

        let bracketed = server_at("[::1]", 8080).socket_addr().unwrap();
        assert_eq!(bracketed, v6);

        assert!(matches!(
            server_at("localhost", 5000).socket_addr(),
            Err(AppError::InvalidInput(_))
        ));
    }
}
