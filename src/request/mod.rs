//! Compiled load requests and the coordinators that govern them.
//!
//! A compiled request tree has [`SingleRequest`] leaves and coordinator
//! interior nodes. Coordinators decide which sibling's result is allowed to
//! reach the target:
//!
//! ```text
//!                 ErrorCoordinator            (error fallback chain)
//!                 /              \
//!     ThumbnailCoordinator     SingleRequest  (error request)
//!         /         \
//!  SingleRequest  SingleRequest
//!     (full)        (thumbnail)
//! ```
//!
//! - [`ThumbnailCoordinator`] races a smaller request against the full one:
//!   whichever finishes first may display, but once the full result lands it
//!   wins permanently.
//! - [`ErrorCoordinator`] runs its error child only after the primary has
//!   definitively failed, and lets only one terminal notification through.
//!
//! The no-thumbnail, no-error case has no coordinator at all; the compiled
//! result is the bare [`SingleRequest`].

mod error_coordinator;
mod listener;
mod options;
mod single;
mod thumbnail_coordinator;
mod traits;

pub use error_coordinator::ErrorCoordinator;
pub use listener::RequestListener;
pub use options::{
    CachePolicy, LoadOptions, Priority, SizeOverride, Transformation, Transition,
};
pub use single::{LoadSpec, SingleRequest, Status};
pub use thumbnail_coordinator::ThumbnailCoordinator;
pub use traits::{Request, RequestCoordinator};
