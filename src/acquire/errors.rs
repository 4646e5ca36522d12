// Error types for the acquisition core

use std::time::Duration;

use thiserror::Error;

/// Failures the invoker can signal to the coordinator.
///
/// A subprocess that launches and exits non-zero is deliberately *not* an
/// error at this level: its captured output is still returned and the
/// coordinator interprets the exit code when deciding whether to fall back.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The extractor binary could not be started (missing tool, bad path).
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The subprocess outlived its deadline and was killed.
    #[error("extractor timed out after {0:?}")]
    Timeout(Duration),

    /// Stdout/stderr pipes could not be captured or read.
    #[error("failed to capture extractor output: {0}")]
    Capture(String),
}

impl AcquireError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
