//! Linkshelf Types - Pure data definitions
//!
//! Rows as the stores hand them out and request schemas as clients send them.
//! No async runtime or storage dependencies live here.

pub mod achievement;
pub mod bookmark;
pub mod category;
pub mod section;
pub mod user;

pub use achievement::*;
pub use bookmark::*;
pub use category::*;
pub use section::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Row identifier assigned by the store
pub type Id = i64;

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Pair with `#[serde(default)]`: a missing key stays `None`, `null` becomes
/// `Some(None)` and a value becomes `Some(Some(v))`.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Empty JSON object used for settings columns
pub fn empty_settings() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
