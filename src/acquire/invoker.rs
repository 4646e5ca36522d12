// Extractor invoker - builds yt-dlp argument lists and runs the binary
// under an absolute deadline.
//
// Two invocation modes:
// - MaterializeFile: download + remux into the artifacts root, then print
//   the final file path and the title as the last two non-empty stdout lines.
// - ResolveStreamUrl: metadata-only; print the direct media URL as the first
//   non-empty stdout line, with the title after it.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::errors::AcquireError;
use super::models::{ExtractionMode, RawOutput};
use crate::config::AppConfig;

/// Quality ladder for materialization: pre-muxed 1080p ladder down to a
/// generic best-effort fallback, remuxed to mp4 afterwards.
const MATERIALIZE_FORMAT: &str =
    "bv*[height<=1080]+ba[ext=m4a]/bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/best";

/// Shorter variant of the same ladder for stream resolution.
const STREAM_FORMAT: &str = "bv*[height<=1080]+ba[ext=m4a]/b[ext=mp4]/best";

/// Output template; the id suffix keeps concurrent requests from colliding
/// on a filename without any cross-request locking.
const OUTPUT_TEMPLATE: &str = "%(title)s-%(id)s.%(ext)s";

/// Seam between the fallback coordinator and the real subprocess, so the
/// state machine can be exercised with a scripted extractor in tests.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Name of the extractor (for logging).
    fn name(&self) -> &'static str;

    /// Run one extraction. A non-zero exit is *not* an `Err`: the captured
    /// output comes back as `Ok` and the caller interprets the exit code.
    /// `Err` is reserved for launch failures, capture failures and deadline
    /// expiry.
    async fn invoke(&self, mode: ExtractionMode, url: &str) -> Result<RawOutput, AcquireError>;
}

/// Invoker backed by the native yt-dlp binary.
pub struct YtDlpInvoker {
    config: AppConfig,
}

impl YtDlpInvoker {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Check that the configured binary actually runs, for a startup probe.
    pub async fn probe_version(&self) -> Option<String> {
        let out = timeout(
            Duration::from_secs(10),
            TokioCommand::new(&self.config.ytdlp_path)
                .arg("--version")
                .output(),
        )
        .await
        .ok()?
        .ok()?;
        if !out.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }

    /// Deterministic, ordered argument list for one mode.
    pub fn build_args(&self, mode: ExtractionMode, url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec!["--no-playlist".into()];

        match mode {
            ExtractionMode::MaterializeFile => {
                args.extend([
                    "-f".into(),
                    MATERIALIZE_FORMAT.into(),
                    "--merge-output-format".into(),
                    "mp4".into(),
                    "--restrict-filenames".into(),
                    "--no-part".into(),
                    "--no-progress".into(),
                    "--geo-bypass".into(),
                    "--retries".into(),
                    "3".into(),
                    "--fragment-retries".into(),
                    "3".into(),
                    "-P".into(),
                    self.config.artifacts_root.to_string_lossy().into_owned(),
                    "-o".into(),
                    OUTPUT_TEMPLATE.into(),
                    // Printed in this order after the file is in place:
                    // path first, title last.
                    "--print".into(),
                    "after_move:filepath".into(),
                    "--print".into(),
                    "after_move:title".into(),
                ]);
            }
            ExtractionMode::ResolveStreamUrl => {
                args.extend([
                    "-f".into(),
                    STREAM_FORMAT.into(),
                    "--geo-bypass".into(),
                    "--retries".into(),
                    "3".into(),
                    "--fragment-retries".into(),
                    "3".into(),
                    "--extractor-args".into(),
                    "youtube:player_client=web".into(),
                    "--get-url".into(),
                    "--print".into(),
                    "title".into(),
                ]);
            }
        }

        // Cookies / auth (helps with bot protection and age gates); the
        // explicit cookies file wins over the browser source.
        if let Some(path) = &self.config.cookies_file {
            args.push("--cookies".into());
            args.push(path.to_string_lossy().into_owned());
        } else if let Some(browser) = &self.config.cookies_from_browser {
            args.push("--cookies-from-browser".into());
            args.push(browser.clone());
        }

        for (name, value) in &self.config.extra_headers {
            args.push("--add-headers".into());
            args.push(format!("{}:{}", name, value));
        }

        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".into());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }

    fn deadline_for(&self, mode: ExtractionMode) -> Duration {
        match mode {
            ExtractionMode::MaterializeFile => self.config.materialize_timeout,
            ExtractionMode::ResolveStreamUrl => self.config.resolve_timeout,
        }
    }
}

#[async_trait]
impl Extractor for YtDlpInvoker {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn invoke(&self, mode: ExtractionMode, url: &str) -> Result<RawOutput, AcquireError> {
        let args = self.build_args(mode, url);
        tracing::debug!(target: "medisave::invoker", %mode, tool = %self.config.ytdlp_path, "spawning extractor");
        run_with_deadline(&self.config.ytdlp_path, &args, self.deadline_for(mode)).await
    }
}

/// Spawn `program` with `args`, capture stdout/stderr incrementally and race
/// the exit against `deadline`. On expiry the process is killed with a
/// non-catchable signal and the partial output is discarded.
pub async fn run_with_deadline(
    program: &str,
    args: &[String],
    deadline: Duration,
) -> Result<RawOutput, AcquireError> {
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AcquireError::Launch {
            tool: program.to_string(),
            source: e,
        })?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| AcquireError::Capture(format!("no stdout pipe from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| AcquireError::Capture(format!("no stderr pipe from {}", program)))?;

    // Drain the pipes concurrently with the wait; a blocked pipe would
    // otherwise deadlock a chatty subprocess.
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map(|_| buf)
            .map_err(|e| format!("failed to read stdout: {}", e))
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map(|_| buf)
            .map_err(|e| format!("failed to read stderr: {}", e))
    });

    match timeout(deadline, child.wait()).await {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| AcquireError::Capture(format!("failed to wait for {}: {}", program, e)))?;
            let stdout = stdout_task
                .await
                .map_err(|e| AcquireError::Capture(format!("stdout task failed: {}", e)))?
                .map_err(AcquireError::Capture)?;
            let stderr = stderr_task
                .await
                .map_err(|e| AcquireError::Capture(format!("stderr task failed: {}", e)))?
                .map_err(AcquireError::Capture)?;
            Ok(RawOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code(),
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(AcquireError::Timeout(deadline))
        }
    }
}

/// Find the yt-dlp binary in common install locations, falling back to PATH.
pub fn find_ytdlp() -> String {
    let common_paths = [
        "/opt/homebrew/bin/yt-dlp", // Homebrew on Apple Silicon
        "/usr/local/bin/yt-dlp",    // Homebrew on Intel Mac / manual install
        "/usr/bin/yt-dlp",          // System package
    ];

    for path in common_paths {
        if std::path::Path::new(path).exists() {
            return path.to_string();
        }
    }

    if let Ok(output) = std::process::Command::new("which").arg("yt-dlp").output() {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let trimmed = path.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }

    "yt-dlp".to_string()
}
