use thiserror::Error;

/// Errors from editing an entity's constituents.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VisualError {
    /// No mesh occupies the slot.
    #[error("no mesh at index {0}")]
    NoSuchMesh(usize),
    /// No exhaust with this index.
    #[error("no exhaust at index {0}")]
    NoSuchExhaust(usize),
}
