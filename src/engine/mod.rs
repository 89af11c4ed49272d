//! The external cache/executor collaborator interface.
//!
//! The engine owns everything the coordination core does not: memory and
//! disk cache storage, fetching, decoding and transformation. The core only
//! needs start/cancel semantics and a priority hint, expressed by the
//! [`Engine`] trait. Storage format and scheduling are opaque behind
//! [`EngineKey`].
//!
//! # Callback contract
//!
//! For every [`Engine::fetch`] call the implementation must eventually invoke
//! exactly one of [`ResourceCallback::on_fetch_complete`] or
//! [`ResourceCallback::on_fetch_failed`], unless the cancellation token was
//! cancelled first, in which case invoking neither is allowed. Callbacks must
//! not be invoked concurrently with other core entry points for the same
//! target slot; hosts deliver them on the slot's control thread.
//!
//! # Cache-write isolation
//!
//! Failures of opportunistic cache writes after a successful load
//! ([`crate::error::CacheWriteError`]) must be reported out-of-band via
//! [`report_cache_write_failure`] (or equivalent logging) and must never
//! surface through [`ResourceCallback::on_fetch_failed`]; the successfully
//! loaded resource is still delivered.

use crate::error::{CacheWriteError, LoadError};
use crate::model::Model;
use crate::request::{CachePolicy, Priority, Transformation};
use crate::resource::Resource;
use std::sync::Weak;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Sentinel dimension meaning "the source's natural size".
pub const SIZE_ORIGINAL: u32 = 0;

/// Key identifying one cacheable unit of work inside the engine.
///
/// Two fetches with equal keys may be coalesced or served from cache by the
/// engine; the core never inspects a key beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineKey {
    /// The model being loaded.
    pub model: Model,
    /// Requested width in pixels, or [`SIZE_ORIGINAL`].
    pub width: u32,
    /// Requested height in pixels, or [`SIZE_ORIGINAL`].
    pub height: u32,
    /// Fit transformation baked into the decoded result.
    pub transformation: Option<Transformation>,
}

impl std::fmt::Display for EngineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}x{}", self.model, self.width, self.height)
    }
}

/// Everything the engine needs to start one fetch.
#[derive(Debug, Clone)]
pub struct FetchSpec {
    /// Cache key for the unit of work.
    pub key: EngineKey,
    /// Scheduling priority hint.
    pub priority: Priority,
    /// Cache read/write directives.
    pub cache: CachePolicy,
}

/// Receives the terminal result of one fetch.
///
/// Held weakly by the engine so a dropped request tree cannot be called
/// back into.
pub trait ResourceCallback: Send + Sync {
    /// The fetch produced a decoded resource.
    fn on_fetch_complete(&self, resource: Resource);

    /// The fetch failed after the engine exhausted its own retries.
    fn on_fetch_failed(&self, error: LoadError);
}

/// The cache/executor collaborator.
///
/// Implementations run fetch/decode work on their own workers and report
/// back per the module-level callback contract.
pub trait Engine: Send + Sync {
    /// Starts an asynchronous fetch for `spec`.
    ///
    /// The fetch observes `cancel`: once cancelled, the engine stops the
    /// work when practical and suppresses both callbacks. `callback` is
    /// upgraded at delivery time; an unupgradeable callback is dropped
    /// silently.
    fn fetch(
        &self,
        spec: FetchSpec,
        callback: Weak<dyn ResourceCallback>,
        cancel: CancellationToken,
    );
}

/// Reports an opportunistic cache-write failure out-of-band.
///
/// The load that produced the resource has already succeeded and been
/// delivered; this is the uncaught-error hook for the write that didn't
/// stick.
pub fn report_cache_write_failure(error: &CacheWriteError) {
    warn!(key = %error.key, message = %error.message, "Cache write failed after successful load");
}
