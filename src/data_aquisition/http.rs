use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::topology::source::{CrawlError, InfoSource};

/// Settings for the HTTP client used to reach peers.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

/// Fetches `/info` from peers over HTTP.
pub struct HttpInfoSource {
    client: reqwest::Client,
}

impl HttpInfoSource {
    pub fn new(config: &FetchConfig) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CrawlError::network("<client>", e))?;
        Ok(Self { client })
    }
}

/// Builds the info endpoint for a peer address such as `127.0.0.1:9000/sarga`.
pub fn info_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        format!("{address}/info")
    } else {
        format!("http://{address}/info")
    }
}

#[async_trait]
impl InfoSource for HttpInfoSource {
    async fn fetch_info(&self, address: &str) -> Result<String, CrawlError> {
        let url = info_url(address);
        debug!(%url, "fetching peer info");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| CrawlError::network(address, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::network(address, format!("HTTP status {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| CrawlError::network(address, e))
    }
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode, routing::get};
    use tokio::net::TcpListener;

    use super::*;

    async fn spawn_peer(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr.to_string()
    }

    #[test]
    fn test_info_url() {
        assert_eq!(info_url("127.0.0.1:9000/sarga"), "http://127.0.0.1:9000/sarga/info");
        assert_eq!(info_url("10.0.0.2:9001/"), "http://10.0.0.2:9001/info");
        assert_eq!(info_url("https://peer.example"), "https://peer.example/info");
    }

    #[tokio::test]
    async fn test_fetch_info_body() {
        let router = Router::new().route("/sarga/info", get(|| async { "{\"ID\":\"A\"}" }));
        let addr = spawn_peer(router).await;

        let source = HttpInfoSource::new(&FetchConfig::default()).unwrap();
        let body = source.fetch_info(&format!("{addr}/sarga")).await.unwrap();
        assert_eq!(body, "{\"ID\":\"A\"}");
    }

    #[tokio::test]
    async fn test_error_status_is_network_failure() {
        let router = Router::new().route(
            "/info",
            get(|| async { (StatusCode::NOT_FOUND, "no such peer") }),
        );
        let addr = spawn_peer(router).await;

        let source = HttpInfoSource::new(&FetchConfig::default()).unwrap();
        let err = source.fetch_info(&addr).await.unwrap_err();
        assert!(matches!(err, CrawlError::NetworkFailure { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_network_failure() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let source = HttpInfoSource::new(&FetchConfig::default()).unwrap();
        let err = source.fetch_info(&addr).await.unwrap_err();
        assert!(matches!(err, CrawlError::NetworkFailure { .. }));
    }
}
