//! PATCH body helpers
//!
//! Optional fields in PATCH bodies come in three states: absent (keep),
//! `null` (clear) and a value (set). Nullable fields are declared as
//! `Option<Option<T>>` with `#[serde(default, deserialize_with = "nullable")]`.

use serde::{Deserialize, Deserializer};

/// Absent stays `None` (via `default`), `null` becomes `Some(None)`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Apply a nullable PATCH field onto the stored value.
pub fn merge<T>(patch: Option<Option<T>>, current: Option<T>) -> Option<T> {
    match patch {
        Some(value) => value,
        None => current,
    }
}
