//! Shared utilities for integration and load testing.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use request_deadline::{HttpServer, ServerConfig, Shutdown};

/// Config with the given deadline, bound to an ephemeral local port.
#[allow(dead_code)]
pub fn config_with_timeout(timeout: &str) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.deadline.timeout = timeout.to_string();
    config
}

/// Start an `HttpServer` in the background. Triggering the returned
/// `Shutdown` stops it.
#[allow(dead_code)]
pub async fn start_server(config: ServerConfig, routes: Option<Router>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = match routes {
        Some(routes) => HttpServer::with_routes(config, routes).unwrap(),
        None => HttpServer::new(config).unwrap(),
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Serve a bare router, for tests that build their own deadline layer.
#[allow(dead_code)]
pub async fn start_router(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

/// HTTP client without connection pooling or proxies.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
