//! Client library for the RICOH Media Storage REST API.
//!
//! [`MediaStorage`] lists, searches, uploads, downloads and deletes media
//! objects, and reads and writes the metadata attached to them. Every
//! operation resolves to a [`MediaResult`]; failures of any origin (no
//! session, bad arguments, network, HTTP status, undecodable body) share the
//! one [`MediaStorageError`] type.
//!
//! ```no_run
//! use media_storage::{ClientConfig, MediaStorage, StaticTokenSession};
//! use std::collections::BTreeMap;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let storage = MediaStorage::new(StaticTokenSession::new("token"), ClientConfig::from_env()?)?;
//! storage.connect().await?;
//!
//! let info = storage.upload(std::fs::read("photo.jpg")?).await?;
//! storage.add_user_meta(&info.id, [("rating", "5")]).await?;
//!
//! let page = storage.list(&BTreeMap::new()).await?;
//! for id in page.ids() {
//!     println!("{}", id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The token comes from a [`SessionProvider`]; how it is obtained (user or
//! client credentials) is up to the provider.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use errors::{ErrorKind, MediaResult, MediaStorageError};
pub use models::{
    media::{MediaContent, MediaIndex, MediaInfo},
    metadata::{MediaMetadata, UserMetaKey},
    paging::{MediaPage, PageCursor},
};
pub use services::media_storage::{
    MediaStorage, MediaStream, SEARCH_FILTER_KEY, SEARCH_VERSION, UserMetaWrite,
    UserMetaWriteReport,
};
pub use session::{AccessToken, SessionProvider, StaticTokenSession, StaticTokenError};
pub use transport::{HttpClient, ReqwestClient, TransportError};
