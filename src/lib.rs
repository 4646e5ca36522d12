// medisave - submit a media URL, get a downloadable or playable local copy.
//
// The acquisition core orchestrates yt-dlp across two invocation modes
// (materialize a local file, or resolve a direct stream URL as fallback);
// the server module is a thin HTTP surface over it.

pub mod acquire;
pub mod config;
pub mod server;

pub use acquire::{AcquisitionOutcome, FallbackCoordinator, YtDlpInvoker};
pub use config::AppConfig;
