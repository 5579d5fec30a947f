//! The record model: `i64` keys, opaque byte values, zero-length tombstones.

/// Key type used throughout the engine.
pub type Key = i64;

/// Value type: an opaque byte string. Length zero marks a deletion.
pub type Value = Vec<u8>;

pub use learned::Record;

/// `true` if `value` is the tombstone marker.
#[must_use]
pub fn is_tombstone(value: &[u8]) -> bool {
    value.is_empty()
}
