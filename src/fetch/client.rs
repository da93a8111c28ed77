use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes HTTP requests on behalf of the source loader.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
