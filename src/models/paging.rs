use serde::{Deserialize, Serialize};

use super::media::MediaIndex;

/// Continuation tokens for list and search.
///
/// The values are opaque: they are passed back to the service untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PageCursor {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

/// One page of a listing, in the order the service returned it.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaPage {
    #[serde(rename = "media")]
    pub entries: Vec<MediaIndex>,
    #[serde(rename = "paging")]
    pub cursor: PageCursor,
}

impl MediaPage {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.id.as_str())
    }
}
