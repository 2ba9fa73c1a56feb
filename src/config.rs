use anyhow::{Context, Result, bail};
use reqwest::Url;
use std::env;

/// Production endpoint of the media storage service.
pub const DEFAULT_ENDPOINT: &str = "https://mss.ricohapi.com/v1/media";

/// Client configuration.
/// Built from defaults, environment variables, or explicit setters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the media collection; every request path hangs off it.
    pub endpoint: String,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Read `MSS_ENDPOINT` and `MSS_USER_AGENT`, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let endpoint = match env::var("MSS_ENDPOINT") {
            Ok(value) => value,
            Err(env::VarError::NotPresent) => DEFAULT_ENDPOINT.to_string(),
            Err(err) => return Err(err).context("reading MSS_ENDPOINT"),
        };
        let user_agent = env::var("MSS_USER_AGENT").unwrap_or_else(|_| default_user_agent());

        let cfg = Self {
            endpoint,
            user_agent,
        };
        cfg.endpoint_url()
            .with_context(|| format!("parsing MSS_ENDPOINT value `{}`", cfg.endpoint))?;
        Ok(cfg)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The endpoint as an absolute URL that path segments can be pushed onto.
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)
            .with_context(|| format!("invalid endpoint `{}`", self.endpoint))?;
        if url.cannot_be_a_base() {
            bail!("endpoint `{}` cannot be used as a base URL", self.endpoint);
        }
        Ok(url)
    }
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
