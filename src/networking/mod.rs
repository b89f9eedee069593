use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;

/// Per-request limit for smoke-test requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What a GET against a served artifact returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body_bytes: u64,
}

#[derive(Clone)]
pub struct NetworkClient {
    client: Client,
}

impl NetworkClient {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("appwrap/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                warn!("network client: falling back to default HTTP client configuration ({err})");
                Client::new()
            });
        Self { client }
    }

    /// Plain GET of `url`, draining the body to learn its length.
    ///
    /// Non-200 statuses are returned as-is; only transport failures are errors.
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, String> {
        debug!("network: GET {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("GET {url} failed: {e}"))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| format!("reading {url} failed: {e}"))?;
        Ok(FetchResponse {
            status,
            body_bytes: body.len() as u64,
        })
    }
}

impl Default for NetworkClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Join a base URL and a slash-separated relative path.
pub fn join_url(base: &str, relative: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_urls_without_double_slashes() {
        assert_eq!(
            join_url("http://localhost:8000/", "/windows/a.exe"),
            "http://localhost:8000/windows/a.exe"
        );
        assert_eq!(
            join_url("http://localhost:8000", "mac/a.dmg"),
            "http://localhost:8000/mac/a.dmg"
        );
    }

    #[tokio::test]
    async fn unreachable_hosts_are_errors() {
        let client = NetworkClient::with_timeout(Duration::from_millis(500));
        // Port 9 on loopback is closed on any sane test host.
        let err = client.fetch("http://127.0.0.1:9/x").await.unwrap_err();
        assert!(err.starts_with("GET http://127.0.0.1:9/x failed"));
    }
}
