// Artifact store - containment checks around the single directory all
// produced files must live under. The root is the trust boundary: nothing
// outside it is ever served, and its absolute location is never exposed.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if missing.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Verify a path the extractor claims to have produced: non-empty,
    /// existing on disk, and physically inside the root after symlink
    /// resolution. `None` means "treat as missing and fall back", not a
    /// hard failure.
    pub fn verify_claimed(&self, candidate: &str) -> Option<PathBuf> {
        if candidate.is_empty() {
            return None;
        }
        let canonical = std::fs::canonicalize(candidate).ok()?;
        let root = std::fs::canonicalize(&self.root).ok()?;
        if !canonical.starts_with(&root) {
            return None;
        }
        canonical.is_file().then_some(canonical)
    }

    /// Resolve an externally supplied relative path for serving. Rejects
    /// absolute paths and any traversal segment before touching the
    /// filesystem, then re-checks containment after symlink resolution.
    pub fn resolve_relative(&self, relative: &str) -> Result<PathBuf, ResolveError> {
        let rel = Path::new(relative);
        if relative.is_empty() || rel.is_absolute() {
            return Err(ResolveError::Unsafe);
        }
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(ResolveError::Unsafe),
            }
        }

        let joined = self.root.join(rel);
        let canonical = std::fs::canonicalize(&joined).map_err(|_| ResolveError::NotFound)?;
        let root = std::fs::canonicalize(&self.root).map_err(|_| ResolveError::NotFound)?;
        if !canonical.starts_with(&root) {
            return Err(ResolveError::Unsafe);
        }
        if !canonical.is_file() {
            return Err(ResolveError::NotFound);
        }
        Ok(canonical)
    }

    /// Map a verified absolute artifact path back to the relative form used
    /// in externally addressable references.
    pub fn public_path(&self, absolute: &Path) -> Option<String> {
        let root = std::fs::canonicalize(&self.root).ok()?;
        let rel = absolute.strip_prefix(&root).ok()?;
        Some(rel.to_string_lossy().into_owned())
    }
}

/// Why a relative path could not be resolved to a servable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// Traversal attempt or otherwise malformed path. Maps to 400.
    Unsafe,
    /// Safe shape but nothing on disk. Maps to 404.
    NotFound,
}
