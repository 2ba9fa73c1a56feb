//! Recording in-memory client for unit tests.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use reqwest::{Method, StatusCode, Url, header::HeaderMap};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use super::{HttpClient, HttpRequest, RequestBody, StreamingResponse, TransportError};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(self.body.as_deref().unwrap_or_default()).unwrap()
    }
}

enum Canned {
    Response(StatusCode, Bytes),
    Failure(String),
}

/// Answers queued responses in order; an empty queue answers `200` with an
/// empty body.
#[derive(Default)]
pub(crate) struct MockClient {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<Canned>>,
}

impl MockClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: StatusCode, body: impl Into<Bytes>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Canned::Response(status, body.into()));
    }

    pub fn fail(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Canned::Failure(message.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn execute(&self, request: HttpRequest) -> Result<StreamingResponse, TransportError> {
        let body = match request.body {
            RequestBody::Empty => None,
            RequestBody::Bytes(bytes) => Some(bytes),
            RequestBody::Stream(mut s) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = s.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Some(buf.freeze())
            }
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body,
        });

        let canned = self.responses.lock().unwrap().pop_front();
        match canned {
            Some(Canned::Failure(message)) => Err(TransportError::new(message)),
            Some(Canned::Response(status, body)) => Ok(StreamingResponse {
                status,
                headers: HeaderMap::new(),
                body: stream::once(async move { Ok(body) }).boxed(),
            }),
            None => Ok(StreamingResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: stream::empty().boxed(),
            }),
        }
    }
}
