//! Metadata attached to media objects, and the naming rules for the
//! caller-writable `user` namespace.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

use crate::errors::MediaStorageError;

pub const META_EXIF: &str = "exif";
pub const META_GPANO: &str = "gpano";
pub const META_USER: &str = "user";

/// Prefix of a user metadata key in wire form.
pub const USER_META_PREFIX: &str = "user.";

pub const MAX_USER_META_KEY_LEN: usize = 256;
pub const MIN_USER_META_VALUE_LEN: usize = 1;
pub const MAX_USER_META_VALUE_LEN: usize = 1024;

/// All three metadata namespaces of one media object.
///
/// `exif` and `gpano` are filled in by the service; only `user_meta` can be
/// written by callers.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaMetadata {
    #[serde(default)]
    pub exif: HashMap<String, String>,

    /// Google Photo Sphere (panorama) tags.
    #[serde(default)]
    pub gpano: HashMap<String, String>,

    #[serde(default, rename = "user")]
    pub user_meta: HashMap<String, String>,
}

/// Returns true for the names of the three metadata namespaces.
pub fn is_namespace(name: &str) -> bool {
    matches!(name, META_EXIF | META_GPANO | META_USER)
}

/// A validated user metadata key.
///
/// Accepts either the bare token (`rating`) or the prefixed wire form
/// (`user.rating`); both produce the same key. The token must be 1 to 256
/// characters from `[A-Za-z0-9_-]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserMetaKey {
    token: String,
}

impl UserMetaKey {
    pub fn parse(input: &str) -> Option<Self> {
        if let Some(rest) = input.strip_prefix(USER_META_PREFIX) {
            if is_valid_token(rest) {
                return Some(Self {
                    token: rest.to_string(),
                });
            }
        }
        // Anything that is not `user.<token>` is taken whole as a bare token.
        is_valid_token(input).then(|| Self {
            token: input.to_string(),
        })
    }

    /// The bare token, as used in request paths.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The canonical `user.<token>` form.
    pub fn wire_name(&self) -> String {
        format!("{}{}", USER_META_PREFIX, self.token)
    }
}

impl fmt::Display for UserMetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", USER_META_PREFIX, self.token)
    }
}

impl FromStr for UserMetaKey {
    type Err = MediaStorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| MediaStorageError::invalid(s))
    }
}

fn is_valid_token(token: &str) -> bool {
    (1..=MAX_USER_META_KEY_LEN).contains(&token.len())
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Values are measured in UTF-8 bytes.
pub fn is_valid_user_meta_value(value: &str) -> bool {
    (MIN_USER_META_VALUE_LEN..=MAX_USER_META_VALUE_LEN).contains(&value.len())
}
