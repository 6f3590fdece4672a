// src/error.rs

use thiserror::Error;

/// Core error types for Ordain
#[derive(Error, Debug)]
pub enum Error {
    /// The scheduler could not make progress and the rescan budget is
    /// exhausted (or no removable relation was found). Carries the number
    /// of elements left unordered; the transaction must not be applied.
    #[error("dependency ordering failed, {remaining} elements remain")]
    DependencyLoop { remaining: usize },

    /// A scheduling invariant was violated. Returning a wrong permutation
    /// would corrupt a destructive operation, so this is surfaced as a
    /// hard error rather than a best-effort result.
    #[error("internal ordering error: {0}")]
    Internal(String),
}

/// Result type alias using Ordain's Error type
pub type Result<T> = std::result::Result<T, Error>;
