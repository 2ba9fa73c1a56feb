//! The boundary to whatever component issues access tokens.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// An opaque bearer token. Its value never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Obtains or refreshes an access token from user or client credentials.
///
/// The credentials live inside the implementation; the media storage client
/// only ever sees the resulting token.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn establish(&self) -> Result<AccessToken, Self::Error>;
}

#[derive(Debug, Error)]
#[error("no access token was configured")]
pub struct StaticTokenError;

/// A provider that hands out a token obtained elsewhere.
#[derive(Debug, Clone)]
pub struct StaticTokenSession {
    token: String,
}

impl StaticTokenSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticTokenSession {
    type Error = StaticTokenError;

    async fn establish(&self) -> Result<AccessToken, StaticTokenError> {
        if self.token.trim().is_empty() {
            return Err(StaticTokenError);
        }
        Ok(AccessToken::new(self.token.clone()))
    }
}
