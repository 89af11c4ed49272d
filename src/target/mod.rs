//! Display targets and the slots that bind requests to them.
//!
//! A [`Target`] is the host-toolkit surface a load renders into: it can be
//! measured (possibly asynchronously, after layout) and receives lifecycle
//! callbacks. A [`TargetSlot`] wraps one target and manages the single
//! request attached to it, including the duplicate-request reuse policy and
//! the epoch stamp that invalidates stale engine callbacks.

pub mod future;
pub mod slot;

pub use future::LoadFuture;
pub use slot::{AttachOutcome, EpochGuard, TargetSlot};

use crate::error::LoadError;
use crate::request::Transition;
use crate::resource::Resource;

/// Callback receiving a target's measured dimensions.
///
/// Invoked exactly once, either synchronously from [`Target::get_size`] when
/// the size is already known or later when layout settles.
pub type SizeCallback = Box<dyn FnOnce(u32, u32) + Send>;

/// A display surface that loads render into.
///
/// Implementations belong to the host toolkit; all methods are invoked on
/// the slot's control thread.
pub trait Target: Send + Sync + 'static {
    /// Requests the target's dimensions in pixels.
    ///
    /// Targets that already know their size invoke `callback` before
    /// returning; targets waiting on layout hold the callback and invoke it
    /// once measured. Dimensions of zero are never delivered.
    fn get_size(&self, callback: SizeCallback);

    /// The attached request started running. Show a placeholder here.
    fn on_load_started(&self);

    /// A resource is ready for display.
    fn on_resource_ready(&self, resource: &Resource, transition: Transition);

    /// The load failed terminally. Show an error drawable here.
    fn on_load_failed(&self, error: &LoadError);

    /// The attached request was cleared; release the displayed resource.
    fn on_load_cleared(&self);
}
