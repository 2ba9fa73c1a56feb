//! src/services/media_storage.rs
//!
//! MediaStorage: the client-side face of the media storage API. Each method
//! checks for a session, validates its arguments, issues exactly one request
//! (one per entry for `add_user_meta`) and folds whatever comes back into a
//! `MediaStorageError` or a decoded value.

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt, future::join_all};
use reqwest::{
    Url,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::{BTreeMap, HashMap},
    io,
    path::Path,
    pin::Pin,
    sync::Arc,
};
use tokio::{
    fs::File,
    io::{AsyncWrite, AsyncWriteExt},
    sync::RwLock,
};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info, warn};

use crate::{
    config::ClientConfig,
    errors::{MediaResult, MediaStorageError},
    models::{
        media::{MediaContent, MediaInfo},
        metadata::{
            META_USER, MAX_USER_META_VALUE_LEN, MIN_USER_META_VALUE_LEN, MediaMetadata,
            UserMetaKey, is_namespace, is_valid_user_meta_value,
        },
        paging::MediaPage,
    },
    session::{AccessToken, SessionProvider},
    transport::{HttpClient, HttpResponse, ReqwestClient, StreamingResponse, Transport, TransportError},
};

const CONTENT_PATH: &str = "content";
const META_PATH: &str = "meta";
const SEARCH_PATH: &str = "search";

/// List parameter that turns a listing into a search.
pub const SEARCH_FILTER_KEY: &str = "filter";
pub const SEARCH_VERSION: &str = "2016-07-08";

const UPLOAD_CONTENT_TYPE: &str = "image/jpeg";

/// Body chunks of a download in progress.
pub type MediaStream = Pin<Box<dyn Stream<Item = MediaResult<Bytes>> + Send>>;

#[derive(Serialize)]
struct SearchRequest<'a> {
    search_version: &'a str,
    query: &'a str,
    paging: &'a BTreeMap<String, String>,
}

/// Outcome of writing one user metadata entry.
#[derive(Debug)]
pub struct UserMetaWrite {
    /// The key exactly as the caller supplied it.
    pub key: String,
    pub result: MediaResult<()>,
}

/// Outcomes of `add_user_meta`, one per entry, in input order.
///
/// Entries are written independently: a failure leaves the other keys
/// written.
#[derive(Debug)]
pub struct UserMetaWriteReport {
    pub outcomes: Vec<UserMetaWrite>,
}

impl UserMetaWriteReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|w| w.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &MediaStorageError)> {
        self.outcomes
            .iter()
            .filter_map(|w| w.result.as_ref().err().map(|err| (w.key.as_str(), err)))
    }
}

/// Client for one media collection.
///
/// The access token is the only mutable state. It is written by `connect`
/// and read by every other operation; concurrent operations share it
/// through a read lock.
pub struct MediaStorage<S> {
    session: S,
    transport: Transport,
    endpoint: Url,
    token: RwLock<Option<AccessToken>>,
}

impl<S: SessionProvider> MediaStorage<S> {
    /// Create a client that talks to the network through `reqwest`.
    pub fn new(session: S, config: ClientConfig) -> anyhow::Result<Self> {
        let client = ReqwestClient::new(&config)?;
        Self::with_client(session, config, Arc::new(client))
    }

    /// Create a client on top of any [`HttpClient`].
    pub fn with_client(
        session: S,
        config: ClientConfig,
        client: Arc<dyn HttpClient>,
    ) -> anyhow::Result<Self> {
        let endpoint = config.endpoint_url()?;
        Ok(Self {
            session,
            transport: Transport::new(client),
            endpoint,
            token: RwLock::new(None),
        })
    }

    /// Establish (or refresh) the session and keep its token.
    ///
    /// The provider's error is returned unchanged; a previously held token
    /// stays in place when it fails.
    pub async fn connect(&self) -> Result<AccessToken, S::Error> {
        match self.session.establish().await {
            Ok(token) => {
                *self.token.write().await = Some(token.clone());
                info!("media storage session established");
                Ok(token)
            }
            Err(err) => {
                warn!("failed to establish media storage session: {}", err);
                Err(err)
            }
        }
    }

    pub async fn has_session(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// List media, or search when `params` carries a `filter` entry.
    ///
    /// - Without `filter`: `GET {base}` with `params` as the query string.
    /// - With `filter`: `POST {base}/search` with a JSON body holding the
    ///   filter as `query` and the remaining entries as `paging`.
    ///
    /// Paging cursors come back in `MediaPage::cursor` and are fed back
    /// by the caller; nothing is traversed automatically.
    pub async fn list(&self, params: &BTreeMap<String, String>) -> MediaResult<MediaPage> {
        let mut headers = self.auth_headers().await?;

        let response = match params.get(SEARCH_FILTER_KEY) {
            Some(filter) => {
                let mut paging = params.clone();
                paging.remove(SEARCH_FILTER_KEY);
                let body = serde_json::to_vec(&SearchRequest {
                    search_version: SEARCH_VERSION,
                    query: filter,
                    paging: &paging,
                })
                .map_err(|err| MediaStorageError::invalid(format!("search request: {}", err)))?;

                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                let url = self.collection_url(SEARCH_PATH)?;
                debug!("searching media with {} paging parameters", paging.len());
                self.transport.post(url, headers, Bytes::from(body)).await
            }
            None => {
                self.transport
                    .get(self.endpoint.clone(), params, headers)
                    .await
            }
        };

        decode_json(classify(response)?)
    }

    /// Upload raw image bytes as a new media object.
    pub async fn upload(&self, data: impl Into<Bytes>) -> MediaResult<MediaInfo> {
        let headers = self.upload_headers().await?;
        let response = self
            .transport
            .upload(self.endpoint.clone(), headers, data.into())
            .await;
        decode_json(classify(response)?)
    }

    /// Upload a payload produced incrementally, without buffering it.
    pub async fn upload_stream<St>(&self, stream: St) -> MediaResult<MediaInfo>
    where
        St: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let headers = self.upload_headers().await?;
        let body = stream.map_err(TransportError::from_source).boxed();
        let response = self
            .transport
            .upload_stream(self.endpoint.clone(), headers, body)
            .await;
        decode_json(classify(response)?)
    }

    /// Stream a file from disk as a new media object.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
        self.auth_headers().await?;
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|err| {
            MediaStorageError::invalid(format!("cannot open {}: {}", path.display(), err))
        })?;
        debug!("uploading {}", path.display());
        self.upload_stream(ReaderStream::new(file)).await
    }

    /// Download the full content of a media object into memory.
    pub async fn download(&self, media_id: &str) -> MediaResult<MediaContent> {
        let response = self.open_download(media_id).await?.collect().await?;
        Ok(MediaContent {
            data: response.body,
        })
    }

    /// Download a media object as a stream of chunks.
    ///
    /// The status is checked before the stream is handed out; later errors
    /// can only be transport failures.
    pub async fn download_stream(&self, media_id: &str) -> MediaResult<MediaStream> {
        let response = self.open_download(media_id).await?;
        Ok(response.body.map_err(MediaStorageError::from).boxed())
    }

    /// Copy a media object into `writer`, returning the number of bytes
    /// written.
    pub async fn download_to<W>(&self, media_id: &str, writer: &mut W) -> MediaResult<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let body = self.open_download(media_id).await?.body.map_err(io::Error::other);
        let mut reader = StreamReader::new(body);
        let written = tokio::io::copy(&mut reader, &mut *writer)
            .await
            .map_err(TransportError::from_source)?;
        writer.flush().await.map_err(TransportError::from_source)?;
        Ok(written)
    }

    /// Fetch the descriptor of one media object.
    pub async fn info(&self, media_id: &str) -> MediaResult<MediaInfo> {
        let headers = self.auth_headers().await?;
        let url = self.media_url(media_id, &[])?;
        let response = self.transport.get(url, &BTreeMap::new(), headers).await;
        decode_json(classify(response)?)
    }

    pub async fn delete(&self, media_id: &str) -> MediaResult<()> {
        let headers = self.auth_headers().await?;
        let url = self.media_url(media_id, &[])?;
        classify(self.transport.delete(url, headers).await)?;
        Ok(())
    }

    /// Fetch all three metadata namespaces.
    pub async fn meta(&self, media_id: &str) -> MediaResult<MediaMetadata> {
        let headers = self.auth_headers().await?;
        let url = self.media_url(media_id, &[META_PATH])?;
        let response = self.transport.get(url, &BTreeMap::new(), headers).await;
        decode_json(classify(response)?)
    }

    /// Fetch one namespace (`exif`, `gpano`, `user`) or one user key.
    ///
    /// A user key may be given bare (`rating`) or prefixed (`user.rating`).
    /// Its value is returned as a one-entry map keyed by the prefixed form.
    pub async fn meta_field(
        &self,
        media_id: &str,
        field_name: &str,
    ) -> MediaResult<HashMap<String, String>> {
        let headers = self.auth_headers().await?;
        if field_name.is_empty() {
            return Err(MediaStorageError::invalid("field name is empty"));
        }

        if is_namespace(field_name) {
            let url = self.media_url(media_id, &[META_PATH, field_name])?;
            let response = self.transport.get(url, &BTreeMap::new(), headers).await;
            return decode_json(classify(response)?);
        }

        let key = parse_user_key(field_name)?;
        let url = self.media_url(media_id, &[META_PATH, META_USER, key.token()])?;
        let response = classify(self.transport.get(url, &BTreeMap::new(), headers).await)?;

        // This endpoint answers with the bare value as text/plain.
        let value = std::str::from_utf8(&response.body)
            .map_err(|_| MediaStorageError::malformed(response.status, &response.body))?
            .to_string();
        Ok(HashMap::from([(key.wire_name(), value)]))
    }

    /// Write user metadata entries, one request per entry.
    ///
    /// Entries are validated and written independently and concurrently;
    /// every entry gets its own outcome in the report. An empty input is an
    /// error of the whole call.
    pub async fn add_user_meta<I, K, V>(
        &self,
        media_id: &str,
        user_meta: I,
    ) -> MediaResult<UserMetaWriteReport>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let headers = self.auth_headers().await?;
        let entries: Vec<(String, String)> = user_meta
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if entries.is_empty() {
            return Err(MediaStorageError::invalid(
                "empty user meta was taken: nothing to request",
            ));
        }
        self.media_url(media_id, &[])?;

        let writes = entries.into_iter().map(|(key, value)| {
            let headers = headers.clone();
            async move {
                let result = self.put_user_meta(media_id, &key, &value, headers).await;
                if let Err(err) = &result {
                    debug!("user meta `{}` not written: {}", key, err);
                }
                UserMetaWrite { key, result }
            }
        });

        Ok(UserMetaWriteReport {
            outcomes: join_all(writes).await,
        })
    }

    /// Remove one user key, or every user key when `field_name` is `user`.
    pub async fn remove_user_meta(&self, media_id: &str, field_name: &str) -> MediaResult<()> {
        let headers = self.auth_headers().await?;
        let url = if field_name == META_USER {
            self.media_url(media_id, &[META_PATH, META_USER])?
        } else {
            let key = parse_user_key(field_name)?;
            self.media_url(media_id, &[META_PATH, META_USER, key.token()])?
        };
        classify(self.transport.delete(url, headers).await)?;
        Ok(())
    }

    async fn put_user_meta(
        &self,
        media_id: &str,
        key: &str,
        value: &str,
        mut headers: HeaderMap,
    ) -> MediaResult<()> {
        let key = parse_user_key(key)?;
        if !is_valid_user_meta_value(value) {
            return Err(MediaStorageError::invalid(format!(
                "value of {} must be {} to {} bytes, got {}",
                key,
                MIN_USER_META_VALUE_LEN,
                MAX_USER_META_VALUE_LEN,
                value.len()
            )));
        }

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let url = self.media_url(media_id, &[META_PATH, META_USER, key.token()])?;
        classify(self.transport.put(url, headers, value).await)?;
        Ok(())
    }

    /// Opens a download and checks its status. Error bodies are drained so
    /// they can be reported.
    async fn open_download(&self, media_id: &str) -> MediaResult<StreamingResponse> {
        let headers = self.auth_headers().await?;
        let url = self.media_url(media_id, &[CONTENT_PATH])?;
        let response = self.transport.download(url, headers).await.map_err(|err| {
            warn!("request failed: {}", err);
            MediaStorageError::Transport(err)
        })?;

        if !response.status.is_success() {
            let response = response.collect().await?;
            warn!("download answered with status {}", response.status);
            return Err(MediaStorageError::http_status(
                response.status,
                &response.body,
            ));
        }
        Ok(response)
    }

    /// `Authorization` header for the current token, or `Unauthenticated`.
    async fn auth_headers(&self) -> MediaResult<HeaderMap> {
        let guard = self.token.read().await;
        let token = guard.as_ref().ok_or(MediaStorageError::Unauthenticated)?;

        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.secret()))
            .map_err(|_| MediaStorageError::invalid("access token is not a valid header value"))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    async fn upload_headers(&self) -> MediaResult<HeaderMap> {
        let mut headers = self.auth_headers().await?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(UPLOAD_CONTENT_TYPE));
        Ok(headers)
    }

    /// `{base}/{segment}`.
    fn collection_url(&self, segment: &str) -> MediaResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| MediaStorageError::invalid("endpoint cannot carry a path"))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    /// `{base}/{media_id}/{tail...}` with every segment percent-encoded.
    fn media_url(&self, media_id: &str, tail: &[&str]) -> MediaResult<Url> {
        if media_id.is_empty() {
            return Err(MediaStorageError::invalid("media id is empty"));
        }
        // Dot segments would be resolved away by the URL and hit the parent.
        if media_id == "." || media_id == ".." {
            return Err(MediaStorageError::invalid(format!(
                "media id `{}` is not a usable path segment",
                media_id
            )));
        }
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| MediaStorageError::invalid("endpoint cannot carry a path"))?
            .pop_if_empty()
            .push(media_id)
            .extend(tail);
        Ok(url)
    }
}

fn parse_user_key(field_name: &str) -> MediaResult<UserMetaKey> {
    UserMetaKey::parse(field_name)
        .ok_or_else(|| MediaStorageError::invalid(format!("invalid user meta key `{}`", field_name)))
}

/// Map a transport outcome onto the error taxonomy: no response, then
/// non-2xx status. Decoding is left to the caller.
fn classify(result: Result<HttpResponse, TransportError>) -> MediaResult<HttpResponse> {
    let response = result.map_err(|err| {
        warn!("request failed: {}", err);
        MediaStorageError::Transport(err)
    })?;
    if !response.is_success() {
        warn!("received error status {}", response.status);
        return Err(MediaStorageError::http_status(
            response.status,
            &response.body,
        ));
    }
    Ok(response)
}

fn decode_json<T: DeserializeOwned>(response: HttpResponse) -> MediaResult<T> {
    serde_json::from_slice(&response.body).map_err(|err| {
        warn!("invalid response body ({}): {}", response.status, err);
        MediaStorageError::malformed(response.status, &response.body)
    })
}
