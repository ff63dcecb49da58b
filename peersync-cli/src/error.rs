//! CLI-specific error types and exit code mapping

use peersync_core::error::{CredentialError, PeersyncError};
use peersync_reconciler::ReconcilerError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Required credentials are missing or malformed.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The inventory could not be read before reconciliation started.
    #[error("inventory unavailable: {0}")]
    InventoryUnavailable(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                |
    /// |------|----------------------------------------|
    /// | 0    | Success (discrepancies do not count)   |
    /// | 1    | General / command error                |
    /// | 2    | Configuration or credential error      |
    /// | 3    | Inventory unreachable at start         |
    /// | 10   | IO error                               |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Credential(_) => 2,
            Self::InventoryUnavailable(_) => 3,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<PeersyncError> for CliError {
    fn from(e: PeersyncError) -> Self {
        match e {
            PeersyncError::Config(c) => Self::Config(c.to_string()),
            PeersyncError::Credential(c) => Self::Credential(c),
            PeersyncError::Io(io) => Self::Io(io),
            other => Self::Command(other.to_string()),
        }
    }
}

impl From<ReconcilerError> for CliError {
    fn from(e: ReconcilerError) -> Self {
        match e {
            ReconcilerError::InventoryUnavailable(reason) => Self::InventoryUnavailable(reason),
            ReconcilerError::Config { .. } => Self::Config(e.to_string()),
            ReconcilerError::Io(io) => Self::Io(io),
            other => Self::Command(other.to_string()),
        }
    }
}
