// Acquisition core - orchestrates the external extractor

pub mod artifacts;
pub mod coordinator;
pub mod errors;
pub mod invoker;
pub mod models;
pub mod parser;

pub use artifacts::{ArtifactStore, ResolveError};
pub use coordinator::FallbackCoordinator;
pub use errors::AcquireError;
pub use invoker::{Extractor, YtDlpInvoker};
pub use models::{AcquisitionOutcome, ExtractionMode, FailureKind, ParsedResult, RawOutput};
