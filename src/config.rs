// Application configuration - explicit struct, defaults applied at the boundary

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the acquisition core and the server need, resolved once at
/// startup. Nothing below this layer reads the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the yt-dlp executable.
    pub ytdlp_path: String,
    /// Netscape-format cookies file handed to the extractor, if any.
    pub cookies_file: Option<PathBuf>,
    /// Browser to pull cookies from (e.g. "chrome"), if any. The cookies
    /// file wins when both are set.
    pub cookies_from_browser: Option<String>,
    /// Extra HTTP headers forwarded to the extractor as `--add-headers`.
    pub extra_headers: BTreeMap<String, String>,
    /// SOCKS5/HTTP proxy URL forwarded to the extractor as `--proxy`.
    pub proxy: Option<String>,
    /// Directory all produced files must live under.
    pub artifacts_root: PathBuf,
    /// Socket the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Deadline for a materialization run (large transfers plus remux).
    pub materialize_timeout: Duration,
    /// Deadline for a stream-URL resolution run (metadata only).
    pub resolve_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: "yt-dlp".to_string(),
            cookies_file: None,
            cookies_from_browser: None,
            extra_headers: BTreeMap::new(),
            proxy: None,
            artifacts_root: default_artifacts_root(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            materialize_timeout: Duration::from_secs(480),
            resolve_timeout: Duration::from_secs(90),
        }
    }
}

impl AppConfig {
    /// Build the configuration from environment variables, falling back to
    /// defaults for anything unset. Absence of cookie material means "no
    /// authentication", not an error.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let ytdlp_path = std::env::var("YTDLP_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(crate::acquire::invoker::find_ytdlp);

        let cookies_file = std::env::var("YTDLP_COOKIES")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let cookies_from_browser = std::env::var("YTDLP_COOKIES_FROM_BROWSER")
            .ok()
            .filter(|b| !b.is_empty());

        let proxy = std::env::var("MEDISAVE_PROXY").ok().filter(|p| !p.is_empty());

        let artifacts_root = std::env::var("MEDISAVE_ARTIFACTS_ROOT")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.artifacts_root);

        let bind_addr = std::env::var("MEDISAVE_ADDR")
            .ok()
            .and_then(|a| a.parse().ok())
            .unwrap_or(defaults.bind_addr);

        let materialize_timeout = env_secs("MEDISAVE_MATERIALIZE_TIMEOUT_SECS")
            .unwrap_or(defaults.materialize_timeout);
        let resolve_timeout =
            env_secs("MEDISAVE_RESOLVE_TIMEOUT_SECS").unwrap_or(defaults.resolve_timeout);

        Self {
            ytdlp_path,
            cookies_file,
            cookies_from_browser,
            extra_headers: BTreeMap::new(),
            proxy,
            artifacts_root,
            bind_addr,
            materialize_timeout,
            resolve_timeout,
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn default_artifacts_root() -> PathBuf {
    dirs::download_dir()
        .map(|d| d.join("medisave"))
        .unwrap_or_else(|| std::env::temp_dir().join("medisave"))
}
