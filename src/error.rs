//! Error types for label cache operations.

/// Errors that can occur during label cache operations.
///
/// "Not found" is never an error: lookups report absent entries as `None`
/// or as the reserved ID `0`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A batch write was given a different number of keys and values.
    #[error("length mismatch: {keys} keys, {values} values")]
    LengthMismatch {
        /// Number of keys supplied.
        keys: usize,
        /// Number of values supplied.
        values: usize,
    },

    /// The caller's arena refused an allocation.
    #[error("arena exhausted: requested {requested} bytes (limit {limit:?})")]
    ArenaExhausted {
        /// Size of the failed allocation in bytes.
        requested: usize,
        /// The arena's allocation limit, if one is set.
        limit: Option<usize>,
    },

    /// A label name or value does not fit a 16-bit length field.
    #[error("label too long ({len} bytes, max 65535)")]
    LabelTooLong {
        /// Length of the offending name or value.
        len: usize,
    },

    /// A label set has more labels than a 16-bit count can describe.
    #[error("too many labels ({count}, max 65535)")]
    TooManyLabels {
        /// Number of labels in the set.
        count: usize,
    },

    /// A component ID does not fit a 16-bit length field.
    #[error("component id too long ({len} bytes, max 65535)")]
    ComponentIdTooLong {
        /// Length of the component ID.
        len: usize,
    },

    /// An ID does not fit the fixed 8-byte varint field.
    #[error("id {id} exceeds the 8-byte varint range")]
    IdOverflow {
        /// The ID that could not be encoded.
        id: u64,
    },

    /// Stored bytes could not be decoded.
    #[error("data corrupted: {0}")]
    Corrupted(&'static str),

    /// The persisted store failed.
    #[error("storage error: {0}")]
    Storage(#[from] fjall::Error),

    /// Filesystem error while preparing the store directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for label cache operations.
pub type Result<T> = std::result::Result<T, Error>;
