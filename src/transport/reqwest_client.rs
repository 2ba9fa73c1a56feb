use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};

use super::{HttpClient, HttpRequest, RequestBody, StreamingResponse, TransportError};
use crate::config::ClientConfig;

/// [`HttpClient`] backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { inner })
    }

    /// Reuse an already configured client.
    pub fn from_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<StreamingResponse, TransportError> {
        let mut builder = self
            .inner
            .request(request.method, request.url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream(stream) => {
                builder.body(reqwest::Body::wrap_stream(stream))
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(TransportError::from)
            .boxed();

        Ok(StreamingResponse {
            status,
            headers,
            body,
        })
    }
}
