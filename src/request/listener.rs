//! Optional user-supplied observer for request outcomes.

use crate::error::LoadError;
use crate::model::Model;
use crate::resource::Resource;

/// Observes the terminal outcome of a request tree.
///
/// Both hooks return a consumption flag: `true` suppresses the matching
/// target callback, `false` lets the target handle the event too. Listeners
/// are invoked on the slot's control thread before the target.
pub trait RequestListener: Send + Sync {
    /// The tree produced a displayable resource.
    ///
    /// Returns `true` to consume the event and skip the target's
    /// `on_resource_ready`.
    fn on_resource_ready(&self, resource: &Resource, model: &Model) -> bool {
        let _ = (resource, model);
        false
    }

    /// The tree failed terminally.
    ///
    /// Returns `true` to consume the event and skip the target's
    /// `on_load_failed`.
    fn on_load_failed(&self, error: &LoadError, model: &Model) -> bool {
        let _ = (error, model);
        false
    }
}
