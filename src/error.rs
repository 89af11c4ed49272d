//! Error types for the request pipeline.
//!
//! Errors are split by where they can occur: configuration errors are
//! synchronous and fatal to a single compile/attach call, load errors come
//! from the external engine and drive the coordinator fallback rules, and
//! cache-write errors are isolated so they can never fail a successful load.

use thiserror::Error;

/// Invalid request configuration.
///
/// These are caller errors, signaled synchronously from the compile/attach
/// path. The compile that produced one is abandoned without side effects and
/// is never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `load()` was never called before attaching the builder.
    #[error("load() must be called before attaching a request")]
    ModelNotSet,

    /// Thumbnail size multiplier outside (0, 1].
    #[error("thumbnail size multiplier must be in (0, 1], got {0}")]
    InvalidSizeMultiplier(f32),

    /// A builder was used as both a request and its own thumbnail.
    #[error(
        "a builder cannot be both a request and its own thumbnail; \
         use fork() on the builder passed to thumbnail()"
    )]
    SelfReferentialThumbnail,

    /// A slot was used from a thread other than the one that owns it.
    #[error("target slots may only be used from the thread that created them")]
    WrongThread,
}

/// A fetch or decode failure reported by the engine.
///
/// Load errors transition the owning request to `Failed`; whether a sibling
/// or error request still gets a chance to succeed is decided by the
/// coordinator tree, not by the failing request.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("load failed: {message}")]
pub struct LoadError {
    /// Human-readable failure description.
    pub message: String,
    /// Whether a retry could plausibly succeed (transient failure).
    pub is_retryable: bool,
}

impl LoadError {
    /// Creates a retryable error (transient failure like a network timeout).
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: true,
        }
    }

    /// Creates a permanent error (won't succeed on retry).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_retryable: false,
        }
    }
}

/// Failure of an opportunistic cache write.
///
/// Engines must report these out-of-band (see [`crate::engine::Engine`]) and
/// still deliver the successfully loaded resource; a cache-write failure is
/// never allowed to turn a successful load into a visible failure.
#[derive(Debug, Clone, Error)]
#[error("cache write failed for {key}: {message}")]
pub struct CacheWriteError {
    /// Rendered engine key of the entry that failed to persist.
    pub key: String,
    /// Human-readable failure description.
    pub message: String,
}
