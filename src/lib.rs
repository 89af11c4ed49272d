//! Glint - Asynchronous image loading and caching pipeline core
//!
//! This library implements the request lifecycle and coordination engine of
//! an image-loading pipeline for GUI toolkits: a fluent builder compiles into
//! a tree of cooperating, cancellable, priority-ordered load requests with
//! thumbnail racing and error fallback chains, attached to display target
//! slots with a duplicate-request reuse policy.
//!
//! # Architecture
//!
//! ```text
//! RequestBuilder ──compile──► Request tree ──attach──► TargetSlot
//!       │                        │                        │
//!       │   ErrorCoordinator ◄───┤                        │
//!       │   ThumbnailCoordinator ◄┘                       ▼
//!       │                        │                  Target callbacks
//!       └── options/priority     └──fetch──► Engine (external cache/executor)
//! ```
//!
//! The builder/coordinator tree is owned by a single control thread; decode
//! and fetch work runs in the external [`engine::Engine`] collaborator and
//! reports back through coordinator-gated callbacks.
//!
//! # Example
//!
//! ```ignore
//! use glint::builder::RequestBuilder;
//! use glint::request::Priority;
//! use glint::target::TargetSlot;
//!
//! let slot = TargetSlot::new(view_target);
//! RequestBuilder::new(engine.clone())
//!     .load("https://example.com/photo.jpg")
//!     .priority(Priority::Normal)
//!     .thumbnail_multiplier(0.25)
//!     .into_slot(&slot)?;
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod model;
pub mod request;
pub mod resource;
pub mod target;

#[cfg(test)]
pub(crate) mod test_support;

/// Version of the Glint library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
