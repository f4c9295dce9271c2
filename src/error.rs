use std::io;

use thiserror::Error;

use crate::types::Target;

/// Failure to turn a query into candidate processes. These abort the
/// pipeline and are shown to the user as-is.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("invalid {kind} '{value}': {reason}")]
    InvalidQuery {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("no running process found for {0}")]
    NotFound(Target),

    #[error("socket found but owning process not detected (port {port})")]
    OwnerNotDetected { port: u16 },

    #[error("failed to read system state: {0}")]
    System(#[source] ReadError),
}

impl ResolveError {
    /// Whether re-running with more privileges could change the outcome.
    pub fn needs_privileges(&self) -> bool {
        matches!(
            self,
            ResolveError::OwnerNotDetected { .. } | ResolveError::System(ReadError::PermissionDenied)
        )
    }
}

/// Failure of a single read against the live system.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("process or entry no longer exists")]
    Gone,

    #[error("permission denied")]
    PermissionDenied,

    #[error("malformed entry: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ReadError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ReadError::Gone,
            io::ErrorKind::PermissionDenied => ReadError::PermissionDenied,
            // ESRCH surfaces when a /proc entry vanishes mid-read.
            _ if err.raw_os_error() == Some(3) => ReadError::Gone,
            _ => ReadError::Io(err),
        }
    }
}
