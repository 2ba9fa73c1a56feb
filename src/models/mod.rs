//! Data model of the media storage API.
//!
//! Plain value types decoded from the service's JSON with `serde`. None of
//! them carries identity beyond the ids the service assigns.

pub mod media;
pub mod metadata;
pub mod paging;
