// Common data models for the acquisition pipeline

use std::fmt;
use std::path::PathBuf;

/// How the extractor is invoked for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Download the media into the artifacts root as a single mp4 file.
    MaterializeFile,
    /// Resolve a directly fetchable remote URL without downloading anything.
    ResolveStreamUrl,
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaterializeFile => write!(f, "materialize"),
            Self::ResolveStreamUrl => write!(f, "resolve-stream"),
        }
    }
}

/// Captured output of one finished (or killed) extractor subprocess.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed before exiting on its own.
    pub exit_code: Option<i32>,
}

impl RawOutput {
    /// Trimmed, non-empty stdout lines in order of appearance.
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }
}

/// Fields the parser managed to recover from one subprocess run.
///
/// Absence of a field is not an error here; the coordinator decides
/// whether a missing path or URL means "fall back" or "fail".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResult {
    pub title: Option<String>,
    pub file_path: Option<String>,
    pub stream_url: Option<String>,
}

/// Why an acquisition ultimately failed, after the fallback chain ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The extractor tool could not be started at all.
    Launch,
    /// The tool ran but produced no usable result in either mode.
    Extraction,
    /// At least one attempt hit its deadline and nothing else succeeded.
    Timeout,
}

/// The single result of the acquisition core for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionOutcome {
    /// A verified file inside the artifacts root.
    LocalFile { path: PathBuf, title: String },
    /// A directly fetchable remote URL; nothing was written to disk.
    RemoteStream { url: String, title: Option<String> },
    /// Both tiers of the fallback chain are exhausted.
    Failed {
        kind: FailureKind,
        /// Short, non-sensitive diagnostic safe to surface to the caller.
        diagnostic: String,
    },
}
