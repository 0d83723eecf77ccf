use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes HTTP requests for [`super::fetch_source`].
///
/// Implemented by [`super::BasicClient`]; tests and embedders can wrap or
/// replace it to add headers, proxies or canned responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
