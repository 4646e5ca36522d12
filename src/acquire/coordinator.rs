// Fallback coordinator - sequences the two-tier acquisition strategy.
//
// Start -> TryMaterialize -> {LocalFile | NeedsFallback}
//                         -> TryResolveStream -> {RemoteStream | Failed}
//
// Materialization can fail for reasons (merge errors, restricted formats)
// that do not preclude handing the browser a direct remote URL instead, so
// every materialize failure short of a launch failure gets exactly one
// stream-resolution attempt. The two modes never run concurrently for the
// same request.

use super::artifacts::ArtifactStore;
use super::errors::AcquireError;
use super::invoker::Extractor;
use super::models::{AcquisitionOutcome, ExtractionMode, FailureKind};
use super::parser::{parse, stderr_tail};

const UNKNOWN_TITLE: &str = "Unknown";

pub struct FallbackCoordinator<E: Extractor> {
    extractor: E,
    artifacts: ArtifactStore,
}

impl<E: Extractor> FallbackCoordinator<E> {
    pub fn new(extractor: E, artifacts: ArtifactStore) -> Self {
        Self {
            extractor,
            artifacts,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Run the full chain for one request. Always returns exactly one
    /// outcome; all subprocess-level failures are absorbed into fallback
    /// decisions and only exhaustion of the chain surfaces as `Failed`.
    pub async fn acquire(&self, url: &str) -> AcquisitionOutcome {
        let mut title_hint: Option<String> = None;
        let mut timed_out = false;
        let materialize_diag: String;

        match self.extractor.invoke(ExtractionMode::MaterializeFile, url).await {
            Ok(raw) => {
                let parsed = parse(ExtractionMode::MaterializeFile, &raw);
                title_hint = parsed.title.clone();

                if raw.exit_code == Some(0) {
                    match parsed.file_path.as_deref() {
                        Some(claimed) => match self.artifacts.verify_claimed(claimed) {
                            Some(path) => {
                                let title = parsed.title.unwrap_or_else(|| UNKNOWN_TITLE.into());
                                tracing::info!(
                                    target: "medisave::acquire",
                                    extractor = self.extractor.name(),
                                    ?path,
                                    "materialized local file"
                                );
                                return AcquisitionOutcome::LocalFile { path, title };
                            }
                            None => {
                                materialize_diag =
                                    "produced file missing or outside the artifacts root".into();
                            }
                        },
                        None => {
                            materialize_diag = "no file path in extractor output".into();
                        }
                    }
                } else {
                    materialize_diag = stderr_tail(&raw.stderr);
                }
                tracing::warn!(
                    target: "medisave::acquire",
                    exit_code = ?raw.exit_code,
                    diagnostic = %materialize_diag,
                    "materialization failed, falling back to stream resolution"
                );
            }
            Err(err @ AcquireError::Launch { .. }) => {
                // Tool missing or misconfigured: mode B cannot launch either,
                // so the fallback is pointless. Fatal for this request.
                tracing::error!(target: "medisave::acquire", error = %err, "extractor launch failed");
                return AcquisitionOutcome::Failed {
                    kind: FailureKind::Launch,
                    diagnostic: "extraction tool could not be launched".into(),
                };
            }
            Err(err) => {
                timed_out = err.is_timeout();
                materialize_diag = err.to_string();
                tracing::warn!(
                    target: "medisave::acquire",
                    error = %err,
                    "materialization aborted, falling back to stream resolution"
                );
            }
        }

        let stream_diag = match self.extractor.invoke(ExtractionMode::ResolveStreamUrl, url).await {
            Ok(raw) if raw.exit_code == Some(0) => {
                let parsed = parse(ExtractionMode::ResolveStreamUrl, &raw);
                match parsed.stream_url {
                    Some(stream_url) => {
                        tracing::info!(
                            target: "medisave::acquire",
                            extractor = self.extractor.name(),
                            "resolved remote stream URL"
                        );
                        return AcquisitionOutcome::RemoteStream {
                            url: stream_url,
                            title: parsed.title.or(title_hint),
                        };
                    }
                    None => "no stream URL in extractor output".to_string(),
                }
            }
            Ok(raw) => stderr_tail(&raw.stderr),
            Err(err) => {
                timed_out = timed_out || err.is_timeout();
                match err {
                    AcquireError::Launch { .. } => "extraction tool could not be launched".into(),
                    other => other.to_string(),
                }
            }
        };

        // Both tiers failed for their own reasons; surface both, the stream
        // tier first as the more recent one.
        let mut diagnostic = format!("{}; materialize: {}", stream_diag, materialize_diag);
        // Keep the last title guess visible alongside the diagnostic; it is
        // often the only clue which media the failed request was about.
        if let Some(title) = &title_hint {
            diagnostic = format!("{} (while acquiring \"{}\")", diagnostic, title);
        }
        let kind = if timed_out {
            FailureKind::Timeout
        } else {
            FailureKind::Extraction
        };
        tracing::warn!(target: "medisave::acquire", ?kind, diagnostic = %diagnostic, "fallback chain exhausted");
        AcquisitionOutcome::Failed { kind, diagnostic }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::models::RawOutput;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::fs;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Plays back a fixed script of responses and records invocation order.
    struct ScriptedExtractor {
        script: Mutex<VecDeque<Result<RawOutput, AcquireError>>>,
        calls: Mutex<Vec<ExtractionMode>>,
    }

    impl ScriptedExtractor {
        fn new(script: Vec<Result<RawOutput, AcquireError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<ExtractionMode> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Extractor for ScriptedExtractor {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn invoke(&self, mode: ExtractionMode, _url: &str) -> Result<RawOutput, AcquireError> {
            self.calls.lock().unwrap().push(mode);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("extractor invoked more times than scripted")
        }
    }

    fn ok(exit_code: i32, stdout: &str, stderr: &str) -> Result<RawOutput, AcquireError> {
        Ok(RawOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code: Some(exit_code),
        })
    }

    fn store_with_file(name: &str) -> (tempfile::TempDir, ArtifactStore, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, b"data").unwrap();
        let claimed = path.to_string_lossy().into_owned();
        let store = ArtifactStore::new(dir.path());
        (dir, store, claimed)
    }

    #[tokio::test]
    async fn test_materialize_success_never_falls_back() {
        let (_dir, store, claimed) = store_with_file("My_Video-abc.mp4");
        let extractor = ScriptedExtractor::new(vec![ok(
            0,
            &format!("{}\nMy Video\n", claimed),
            "",
        )]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/watch?v=abc").await;
        match outcome {
            AcquisitionOutcome::LocalFile { path, title } => {
                assert!(path.ends_with("My_Video-abc.mp4"));
                assert_eq!(title, "My Video");
            }
            other => panic!("expected LocalFile, got {:?}", other),
        }
        assert_eq!(
            coordinator.extractor.calls(),
            vec![ExtractionMode::MaterializeFile]
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_falls_back_to_stream() {
        let (_dir, store, _) = store_with_file("unused.mp4");
        let extractor = ScriptedExtractor::new(vec![
            ok(1, "", "ERROR: unable to download video data\n"),
            ok(0, "https://cdn.example.com/stream123\nMy Video\n", ""),
        ]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/watch?v=abc").await;
        assert_eq!(
            outcome,
            AcquisitionOutcome::RemoteStream {
                url: "https://cdn.example.com/stream123".into(),
                title: Some("My Video".into()),
            }
        );
        assert_eq!(
            coordinator.extractor.calls(),
            vec![
                ExtractionMode::MaterializeFile,
                ExtractionMode::ResolveStreamUrl
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_exit_without_file_path_falls_back() {
        let (_dir, store, _) = store_with_file("unused.mp4");
        let extractor = ScriptedExtractor::new(vec![
            ok(0, "Some Title\n", ""),
            ok(0, "https://cdn.example.com/s\n", ""),
        ]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/v").await;
        match outcome {
            AcquisitionOutcome::RemoteStream { title, .. } => {
                // title guess from the failed materialize attempt is preserved
                assert_eq!(title.as_deref(), Some("Some Title"));
            }
            other => panic!("expected RemoteStream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reported_path_missing_on_disk_falls_back() {
        let (dir, store, _) = store_with_file("unused.mp4");
        let ghost = dir.path().join("ghost.mp4");
        let extractor = ScriptedExtractor::new(vec![
            ok(0, &format!("{}\nGhost\n", ghost.to_string_lossy()), ""),
            ok(0, "https://cdn.example.com/s\n", ""),
        ]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/v").await;
        assert!(matches!(outcome, AcquisitionOutcome::RemoteStream { .. }));
    }

    #[tokio::test]
    async fn test_path_outside_root_is_never_served() {
        let (_dir, store, _) = store_with_file("unused.mp4");
        let outside = tempfile::NamedTempFile::with_suffix(".mp4").unwrap();
        let extractor = ScriptedExtractor::new(vec![
            ok(0, &format!("{}\nEscape\n", outside.path().to_string_lossy()), ""),
            ok(1, "", "ERROR: nope\n"),
        ]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/v").await;
        assert!(matches!(outcome, AcquisitionOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_timeout_then_stream_failure_reports_timeout() {
        let (_dir, store, _) = store_with_file("unused.mp4");
        let extractor = ScriptedExtractor::new(vec![
            Err(AcquireError::Timeout(Duration::from_secs(480))),
            ok(1, "", "ERROR: no formats\n"),
        ]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/v").await;
        match outcome {
            AcquisitionOutcome::Failed { kind, diagnostic } => {
                assert_eq!(kind, FailureKind::Timeout);
                assert!(!diagnostic.is_empty());
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal_without_fallback() {
        let (_dir, store, _) = store_with_file("unused.mp4");
        let extractor = ScriptedExtractor::new(vec![Err(AcquireError::Launch {
            tool: "yt-dlp".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/v").await;
        match outcome {
            AcquisitionOutcome::Failed { kind, .. } => assert_eq!(kind, FailureKind::Launch),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(
            coordinator.extractor.calls(),
            vec![ExtractionMode::MaterializeFile]
        );
    }

    #[tokio::test]
    async fn test_exhausted_chain_preserves_title_hint() {
        let (_dir, store, _) = store_with_file("unused.mp4");
        let extractor = ScriptedExtractor::new(vec![
            ok(0, "Half Parsed Title\n", ""),
            ok(1, "", "ERROR: HTTP Error 403: Forbidden\n"),
        ]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/v").await;
        match outcome {
            AcquisitionOutcome::Failed { kind, diagnostic } => {
                assert_eq!(kind, FailureKind::Extraction);
                assert!(diagnostic.contains("403"));
                assert!(diagnostic.contains("Half Parsed Title"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_outcome_reports_both_tiers() {
        let (_dir, store, _) = store_with_file("unused.mp4");
        let extractor = ScriptedExtractor::new(vec![
            ok(1, "", "ERROR: ffmpeg could not merge formats\n"),
            ok(1, "", "ERROR: no formats found\n"),
        ]);
        let coordinator = FallbackCoordinator::new(extractor, store);

        let outcome = coordinator.acquire("https://example.com/v").await;
        match outcome {
            AcquisitionOutcome::Failed { kind, diagnostic } => {
                assert_eq!(kind, FailureKind::Extraction);
                // stream-tier reason first, materialize-tier reason after it
                assert!(diagnostic.contains("no formats found"));
                assert!(diagnostic.contains("could not merge formats"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    /// Extractor that derives its answer from the URL, for concurrency runs.
    struct PerUrlExtractor;

    #[async_trait]
    impl Extractor for PerUrlExtractor {
        fn name(&self) -> &'static str {
            "per-url"
        }

        async fn invoke(&self, mode: ExtractionMode, url: &str) -> Result<RawOutput, AcquireError> {
            tokio::task::yield_now().await;
            match mode {
                ExtractionMode::MaterializeFile => Ok(RawOutput {
                    stdout: String::new(),
                    stderr: "ERROR: simulated\n".into(),
                    exit_code: Some(1),
                }),
                ExtractionMode::ResolveStreamUrl => Ok(RawOutput {
                    stdout: format!("https://cdn.example.com/{}\n", url.rsplit('/').next().unwrap()),
                    stderr: String::new(),
                    exit_code: Some(0),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_complete_independently() {
        let (_dir, store, _) = store_with_file("unused.mp4");
        let coordinator =
            std::sync::Arc::new(FallbackCoordinator::new(PerUrlExtractor, store));

        let mut set = tokio::task::JoinSet::new();
        for i in 0..100 {
            let coordinator = coordinator.clone();
            set.spawn(async move {
                (i, coordinator.acquire(&format!("https://example.com/{}", i)).await)
            });
        }

        let mut seen = 0;
        while let Some(joined) = set.join_next().await {
            let (i, outcome) = joined.unwrap();
            match outcome {
                AcquisitionOutcome::RemoteStream { url, .. } => {
                    assert_eq!(url, format!("https://cdn.example.com/{}", i));
                }
                other => panic!("expected RemoteStream, got {:?}", other),
            }
            seen += 1;
        }
        assert_eq!(seen, 100);
    }
}
