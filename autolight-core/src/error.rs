//! Domain-specific error types for autolight.
//!
//! Capture backends report [`CaptureError`] internally; it never crosses
//! the [`CaptureSource`](crate::capture::CaptureSource) boundary, where it
//! is downgraded to an invalid pixel buffer. [`AutolightError`] is reserved
//! for startup paths (socket setup, configuration) that may fail hard.

use std::time::Duration;
use thiserror::Error;

/// Crate-level error for fallible setup operations.
#[derive(Debug, Error)]
pub enum AutolightError {
    /// The socket/IO layer reported an error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),
}

// ── CaptureError ──────────────────────────────────────────────────

/// Backend-local capture failure.
///
/// Every variant is recoverable by tearing the session down and building
/// it again.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No frame arrived within the acquire budget.
    #[error("no frame within {0:?}")]
    Timeout(Duration),

    /// The OS invalidated the session (mode change, access lost, ...).
    #[error("capture session lost: {0}")]
    SessionLost(String),

    /// The backend has no live session.
    #[error("capture session not initialised")]
    NotInitialized,

    /// No shared-texture publisher is currently registered.
    #[error("no active shared-texture publisher")]
    NoPublisher,

    /// The backend cannot run on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    /// A platform call failed.
    #[error("{0}")]
    Platform(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = CaptureError::Timeout(Duration::from_millis(1000));
        assert!(e.to_string().contains("1s"));

        let e = CaptureError::Unsupported("DXGI desktop duplication");
        assert!(e.to_string().contains("DXGI"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port taken");
        let e: AutolightError = io_err.into();
        assert!(matches!(e, AutolightError::Io(_)));
    }
}
