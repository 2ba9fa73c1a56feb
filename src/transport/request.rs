use bytes::Bytes;
use reqwest::{Method, Url, header::HeaderMap};
use std::{collections::BTreeMap, sync::Arc};
use tracing::debug;

use super::{
    ByteStream, HttpClient, HttpRequest, HttpResponse, RequestBody, StreamingResponse,
    TransportError,
};

/// Request builder over an injected [`HttpClient`].
///
/// Every call is a single fire. Buffered shapes (`send`, `get`, `post`,
/// `put`, `upload`, `delete`) drain the body before returning; `download`
/// hands the body back as a stream.
#[derive(Clone)]
pub struct Transport {
    client: Arc<dyn HttpClient>,
}

impl Transport {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// GET with `params` appended as the query string.
    pub async fn get(
        &self,
        url: Url,
        params: &BTreeMap<String, String>,
        headers: HeaderMap,
    ) -> Result<HttpResponse, TransportError> {
        let url = join_parameters(url, params);
        self.send(Method::GET, url, headers, None).await
    }

    pub async fn post(
        &self,
        url: Url,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        self.send(Method::POST, url, headers, Some(body)).await
    }

    /// PUT a UTF-8 text body.
    pub async fn put(
        &self,
        url: Url,
        headers: HeaderMap,
        text: &str,
    ) -> Result<HttpResponse, TransportError> {
        let body = Bytes::copy_from_slice(text.as_bytes());
        self.send(Method::PUT, url, headers, Some(body)).await
    }

    /// POST a raw payload.
    pub async fn upload(
        &self,
        url: Url,
        headers: HeaderMap,
        data: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        self.send(Method::POST, url, headers, Some(data)).await
    }

    /// POST a payload that is produced incrementally.
    pub async fn upload_stream(
        &self,
        url: Url,
        headers: HeaderMap,
        stream: ByteStream,
    ) -> Result<HttpResponse, TransportError> {
        self.dispatch(Method::POST, url, headers, RequestBody::Stream(stream))
            .await?
            .collect()
            .await
    }

    /// GET without buffering the response body.
    pub async fn download(
        &self,
        url: Url,
        headers: HeaderMap,
    ) -> Result<StreamingResponse, TransportError> {
        self.dispatch(Method::GET, url, headers, RequestBody::Empty)
            .await
    }

    pub async fn delete(&self, url: Url, headers: HeaderMap) -> Result<HttpResponse, TransportError> {
        self.send(Method::DELETE, url, headers, None).await
    }

    pub async fn send(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<HttpResponse, TransportError> {
        let body = body.map_or(RequestBody::Empty, RequestBody::Bytes);
        self.dispatch(method, url, headers, body).await?.collect().await
    }

    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: RequestBody,
    ) -> Result<StreamingResponse, TransportError> {
        debug!("{} {}", method, url);
        let response = self
            .client
            .execute(HttpRequest {
                method,
                url,
                headers,
                body,
            })
            .await?;
        debug!("response status {}", response.status);
        Ok(response)
    }
}

/// Append `params` to `url` as `key=value` pairs joined by `&`.
///
/// Keys and values are form-urlencoded. An empty map leaves the URL without
/// a query string.
pub fn join_parameters(mut url: Url, params: &BTreeMap<String, String>) -> Url {
    if params.is_empty() {
        return url;
    }
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    url
}
