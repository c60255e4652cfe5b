use crate::net::{HttpClient, HttpRequest, HttpResponse};
use anyhow::Result;
use async_trait::async_trait;

/// HTTP client implementation backed by `reqwest`. This is the default used
/// by production builds; tests substitute mocks at the [`HttpClient`] seam.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    inner: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())?;
        let mut builder = self.inner.request(method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status_code = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse { status_code, body })
    }
}
