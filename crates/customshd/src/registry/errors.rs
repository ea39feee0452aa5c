//! Errors raised while building the registry or resolving queries.

use thiserror::Error;

/// Registration failures detected while binding or finalising modules.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two handlers were bound to byte-identical prefixes.
    #[error("prefix '{prefix}' is registered more than once")]
    DuplicatePrefix {
        /// The conflicting prefix, lossily decoded for display.
        prefix: String,
    },
    /// An argument pattern failed to compile.
    #[error("pattern '{pattern}' for prefix '{prefix}' is invalid: {message}")]
    InvalidPattern {
        /// Prefix the pattern was bound to.
        prefix: String,
        /// Pattern source text.
        pattern: String,
        /// Compiler diagnostic.
        message: String,
    },
}

/// Query resolution failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No registered prefix is a prefix of the query.
    #[error("no handler registered for '{query}'")]
    NotFound {
        /// The unmatched query, lossily decoded for display.
        query: String,
    },
}

impl ResolveError {
    pub(crate) fn not_found(query: &[u8]) -> Self {
        Self::NotFound {
            query: String::from_utf8_lossy(query).into_owned(),
        }
    }
}
