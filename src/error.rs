//! Error taxonomy for the storage and indexing engine (see spec §7).

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the paged store, row/index codecs, cursors, FK enforcer and
/// table mutators.
///
/// Policy: I/O and unsupported-codec errors propagate unchanged; validation errors
/// fail fast before any page is written; FK violations abort the in-flight write
/// region.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Underlying file unreachable, short read/write, or a corrupt page header.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// FK or uniqueness violation. Carries the offending row literal and a
    /// description of the foreign key that was violated.
    #[error("constraint violation: {description} (row: {row})")]
    ConstraintViolation {
        /// Human readable description of the foreign key relationship.
        description: String,
        /// Debug rendering of the offending row.
        row: String,
    },

    /// Encrypted file without a capable codec provider.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Expression failed to parse or evaluate (collaborator boundary only: this
    /// crate does not implement the expression evaluator itself, but surfaces
    /// failures reported by it through this variant).
    #[error("evaluation error: {0}")]
    Eval(String),

    /// Validation rejection: duplicate name, too many columns/indexes,
    /// unsupported column type.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// Cycle detected by the topological sorter, or corrupt internal bookkeeping.
    #[error("illegal state: {0}")]
    IllegalState(String),
}

impl Error {
    /// Build a [`Error::ConstraintViolation`] from a description and any `Debug`
    /// row value.
    pub fn constraint_violation(description: impl Into<String>, row: impl fmt::Debug) -> Self {
        Error::ConstraintViolation {
            description: description.into(),
            row: format!("{row:?}"),
        }
    }

    /// Build a [`Error::IllegalArgument`].
    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        Error::IllegalArgument(msg.into())
    }

    /// Build a [`Error::IllegalState`].
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }
}
