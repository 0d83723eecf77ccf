use std::time::Duration;

use super::client::HttpClient;
use async_trait::async_trait;
use tracing::warn;

/// Plain `reqwest` client with the connect and request timeouts the
/// dashboard uses for every source.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    const TIMEOUT: Duration = Duration::from_secs(30);
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "HTTP client build failed, using reqwest defaults without timeouts");
                reqwest::Client::default()
            });
        Self(client)
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_client_reports_refused_connection() {
        let client = BasicClient::new();
        let url = reqwest::Url::parse("http://127.0.0.1:1/meta.json").unwrap();
        let req = reqwest::Request::new(reqwest::Method::GET, url);
        assert!(client.execute(req).await.is_err());
    }
}
