//! The opaque model identifier a request loads data for.

use bytes::Bytes;
use std::path::PathBuf;

/// Opaque user-supplied identifier of the data to load.
///
/// The pipeline never interprets a model; it only forwards it to the engine
/// as part of the cache key and compares it when deciding whether two
/// requests are equivalent.
///
/// Comparison is structural over the variants (byte blobs compare by
/// content). Callers that need distinct cache identities for equal payloads
/// can use [`Model::Token`] with an identifier they mint themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Model {
    /// A remote or local URI.
    Uri(String),
    /// A filesystem path.
    Path(PathBuf),
    /// An in-memory encoded image.
    Blob(Bytes),
    /// An application-defined resource identifier.
    Token(u64),
}

impl From<&str> for Model {
    fn from(uri: &str) -> Self {
        Model::Uri(uri.to_string())
    }
}

impl From<String> for Model {
    fn from(uri: String) -> Self {
        Model::Uri(uri)
    }
}

impl From<PathBuf> for Model {
    fn from(path: PathBuf) -> Self {
        Model::Path(path)
    }
}

impl From<Bytes> for Model {
    fn from(blob: Bytes) -> Self {
        Model::Blob(blob)
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Model::Uri(uri) => write!(f, "{}", uri),
            Model::Path(path) => write!(f, "{}", path.display()),
            Model::Blob(blob) => write!(f, "<blob {} bytes>", blob.len()),
            Model::Token(id) => write!(f, "token-{}", id),
        }
    }
}
