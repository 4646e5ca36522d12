// Output parser - classifies raw extractor stdout into structured fields.
//
// This is a versioned parsing contract over unstructured tool output, not a
// guarantee: the title/noise split rests on an incomplete blocklist of
// diagnostic markers and is best-effort by design. Keep the sample-based
// tests below in sync with any marker change.

use lazy_static::lazy_static;
use regex::Regex;

use super::models::{ExtractionMode, ParsedResult, RawOutput};

lazy_static! {
    static ref URL_RE: Regex = Regex::new(r"^https?://").unwrap();
    // Tool-name echo like "[download]", "[youtube]", "[Merger]"
    static ref TOOL_ECHO_RE: Regex = Regex::new(r"^\[[^\]]+\]").unwrap();
}

/// Container extension the materialize mode remuxes to.
const TARGET_EXT: &str = ".mp4";

/// Parse one finished run. Pure and idempotent; absence of an expected
/// field is an absent `Option`, never an error.
pub fn parse(mode: ExtractionMode, raw: &RawOutput) -> ParsedResult {
    match mode {
        ExtractionMode::MaterializeFile => parse_materialize(raw),
        ExtractionMode::ResolveStreamUrl => parse_stream(raw),
    }
}

fn parse_materialize(raw: &RawOutput) -> ParsedResult {
    let lines = raw.stdout_lines();

    // The file path is printed after the move, so among matching lines the
    // last one is authoritative.
    let file_path = lines
        .iter()
        .rev()
        .find(|l| is_produced_path(l))
        .map(|l| l.to_string());

    // First line that is neither a path, a URL nor recognizable tool noise
    // is the title candidate; later candidates are ignored.
    let mut title = lines
        .iter()
        .find(|l| !is_produced_path(l) && !looks_like_path(l) && !URL_RE.is_match(l) && !is_diagnostic(l))
        .map(|l| l.to_string());

    if title.is_none() {
        title = file_path.as_deref().and_then(title_from_filename);
    }

    ParsedResult {
        title,
        file_path,
        stream_url: None,
    }
}

fn parse_stream(raw: &RawOutput) -> ParsedResult {
    let lines = raw.stdout_lines();

    let stream_url = lines
        .first()
        .filter(|l| URL_RE.is_match(l))
        .map(|l| l.to_string());

    // Any trailing non-URL line is a title hint.
    let title = lines
        .iter()
        .skip(1)
        .rev()
        .find(|l| !URL_RE.is_match(l) && !is_diagnostic(l))
        .map(|l| l.to_string());

    ParsedResult {
        title,
        file_path: None,
        stream_url,
    }
}

fn is_produced_path(line: &str) -> bool {
    line.starts_with('/') && line.contains(TARGET_EXT)
}

fn looks_like_path(line: &str) -> bool {
    line.starts_with('/') || line.starts_with("./") || line.starts_with("~/")
}

fn is_diagnostic(line: &str) -> bool {
    TOOL_ECHO_RE.is_match(line)
        || line.starts_with("WARNING")
        || line.starts_with("ERROR")
        || line.starts_with("yt-dlp")
        || line.contains("Downloading")
        || line.contains("Destination")
}

/// Derive a display title from the produced filename by stripping the
/// template's `-<id>` suffix and the filename sanitization underscores.
fn title_from_filename(path: &str) -> Option<String> {
    let stem = std::path::Path::new(path).file_stem()?.to_str()?;
    // Best effort: the template appends exactly one "-<id>" segment, so
    // everything after the last hyphen is dropped.
    let base = match stem.rfind('-') {
        Some(idx) if idx > 0 => &stem[..idx],
        _ => stem,
    };
    Some(base.replace('_', " "))
}

/// Short, non-sensitive diagnostic extracted from captured stderr: actionable
/// error lines first, otherwise the last non-empty line, capped in length.
pub fn stderr_tail(stderr: &str) -> String {
    const MAX_LEN: usize = 300;

    let important: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:") || l.contains("HTTP Error") || l.contains("Unsupported URL"))
        .take(2)
        .collect();

    let tail = if !important.is_empty() {
        important.join(" | ")
    } else {
        stderr
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no diagnostic output")
            .to_string()
    };

    tail.chars().take(MAX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(stdout: &str) -> RawOutput {
        RawOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    #[test]
    fn test_materialize_path_and_title() {
        let out = raw("/tmp/artifacts/My_Video-abc.mp4\nMy Video\n");
        let parsed = parse(ExtractionMode::MaterializeFile, &out);
        assert_eq!(parsed.file_path.as_deref(), Some("/tmp/artifacts/My_Video-abc.mp4"));
        assert_eq!(parsed.title.as_deref(), Some("My Video"));
    }

    #[test]
    fn test_materialize_skips_diagnostic_noise() {
        let out = raw(concat!(
            "[youtube] abc: Downloading webpage\n",
            "[download] Destination: /tmp/artifacts/My_Video-abc.f137.mp4\n",
            "WARNING: some formats are unavailable\n",
            "/tmp/artifacts/My_Video-abc.mp4\n",
            "My Video\n",
        ));
        let parsed = parse(ExtractionMode::MaterializeFile, &out);
        assert_eq!(parsed.file_path.as_deref(), Some("/tmp/artifacts/My_Video-abc.mp4"));
        assert_eq!(parsed.title.as_deref(), Some("My Video"));
    }

    #[test]
    fn test_materialize_first_title_candidate_wins() {
        let out = raw("First Title\n/tmp/artifacts/a-x1.mp4\nSecond Title\n");
        let parsed = parse(ExtractionMode::MaterializeFile, &out);
        assert_eq!(parsed.title.as_deref(), Some("First Title"));
    }

    #[test]
    fn test_materialize_title_fallback_from_filename() {
        let out = raw("/tmp/artifacts/My_Video-dQw4w9WgXcQ.mp4\n");
        let parsed = parse(ExtractionMode::MaterializeFile, &out);
        assert_eq!(parsed.title.as_deref(), Some("My Video"));
    }

    #[test]
    fn test_materialize_nothing_usable() {
        let out = raw("[youtube] abc: Downloading webpage\nERROR: unable to download\n");
        let parsed = parse(ExtractionMode::MaterializeFile, &out);
        assert_eq!(parsed.file_path, None);
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let out = raw("/tmp/artifacts/My_Video-abc.mp4\nMy Video\n");
        let first = parse(ExtractionMode::MaterializeFile, &out);
        let second = parse(ExtractionMode::MaterializeFile, &out);
        assert_eq!(first, second);
    }

    #[test]
    fn test_stream_url_and_title() {
        let out = raw("https://cdn.example.com/stream123\nMy Video\n");
        let parsed = parse(ExtractionMode::ResolveStreamUrl, &out);
        assert_eq!(parsed.stream_url.as_deref(), Some("https://cdn.example.com/stream123"));
        assert_eq!(parsed.title.as_deref(), Some("My Video"));
    }

    #[test]
    fn test_stream_url_without_title() {
        let out = raw("https://cdn.example.com/stream123\n");
        let parsed = parse(ExtractionMode::ResolveStreamUrl, &out);
        assert_eq!(parsed.stream_url.as_deref(), Some("https://cdn.example.com/stream123"));
        assert_eq!(parsed.title, None);
    }

    #[test]
    fn test_stream_first_line_must_be_url() {
        let out = raw("ERROR: no formats found\n");
        let parsed = parse(ExtractionMode::ResolveStreamUrl, &out);
        assert_eq!(parsed.stream_url, None);
    }

    #[test]
    fn test_stderr_tail_prefers_error_lines() {
        let stderr = "some noise\nERROR: HTTP Error 403: Forbidden\nmore noise\n";
        assert_eq!(stderr_tail(stderr), "ERROR: HTTP Error 403: Forbidden");
    }

    #[test]
    fn test_stderr_tail_falls_back_to_last_line() {
        assert_eq!(stderr_tail("first\nlast one\n\n"), "last one");
        assert_eq!(stderr_tail(""), "no diagnostic output");
    }
}
