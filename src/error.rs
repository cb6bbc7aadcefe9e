//! Errors surfaced by the host when an invocation cannot complete.

use thiserror::Error;

/// Result type for host invocations
pub type Result<T> = std::result::Result<T, HostError>;

/// Host-level failures. Contracts never return these; they report
/// application errors through their result code instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The module does not export the requested symbol
    #[error("Module '{module}' has no exported entry point '{symbol}'")]
    MissingEntryPoint {
        /// Name of the module that was searched
        module: String,
        /// The symbol the host looked for
        symbol: String,
    },

    /// The entry point aborted execution
    #[error("Entry point '{symbol}' trapped: {reason}")]
    Trap {
        /// The symbol that was executing
        symbol: String,
        /// Panic payload, if it carried a message
        reason: String,
    },
}
