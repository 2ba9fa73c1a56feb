//! Media objects as the service describes them.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptor of a stored media object, returned by upload and info.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MediaInfo {
    /// Service-assigned identifier.
    pub id: String,

    /// MIME type recorded at upload time.
    pub content_type: String,

    /// Payload size in bytes.
    pub bytes: u64,

    /// Creation timestamp exactly as the service reported it.
    pub created_at: String,
}

impl MediaInfo {
    /// `created_at` parsed as an RFC 3339 timestamp and converted to UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// The identity-only entry returned by list and search.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MediaIndex {
    pub id: String,
}

/// Raw payload of a downloaded object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaContent {
    pub data: Bytes,
}

impl MediaContent {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
