//! Core contracts between requests, coordinators and the target binder.
//!
//! [`Request`] is implemented by [`crate::request::SingleRequest`] and by
//! both coordinator variants, so a coordinator tree is itself a request the
//! slot can begin, clear and compare. [`RequestCoordinator`] is the
//! capability set a request consults before touching its target.

use std::any::Any;
use std::sync::Arc;

/// A compiled, runnable load operation.
///
/// All methods must be called from the owning slot's control thread, except
/// the read-only state queries which engine callbacks may use through their
/// coordinator.
pub trait Request: Send + Sync + 'static {
    /// Starts or restarts the request.
    ///
    /// Beginning a `Complete` request re-delivers its result; beginning a
    /// `Failed` request retries it; beginning a `Running` or `Cleared`
    /// request is a logged no-op.
    fn begin(&self);

    /// Cancels in-flight work and releases the held resource.
    ///
    /// Clearing an already-cleared request is a no-op, never an error.
    fn clear(&self);

    /// Returns true while work is in flight.
    fn is_running(&self) -> bool;

    /// Returns true once a result has been produced.
    fn is_complete(&self) -> bool;

    /// Returns true if this request (or any descendant) has set a resource.
    fn is_resource_set(&self) -> bool;

    /// Returns true once the request has been cleared.
    fn is_cleared(&self) -> bool;

    /// Returns true if the request failed terminally.
    fn is_failed(&self) -> bool;

    /// Deep structural comparison for the duplicate-request reuse policy.
    ///
    /// Equivalence means same model, same effective options and the same
    /// tree shape; it is never reference identity.
    fn is_equivalent_to(&self, other: &dyn Request) -> bool;

    /// Downcast support for [`Request::is_equivalent_to`].
    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Request")
    }
}

/// Capability set governing which sibling request may act on the target.
///
/// Every variant defers to its parent first: a request deep in the tree may
/// only act if every coordinator above it agrees.
pub trait RequestCoordinator: Send + Sync + 'static {
    /// May `request` set the displayed image?
    fn can_set_image(&self, request: &dyn Request) -> bool;

    /// May `request` notify the target of a non-terminal status change
    /// (load started, placeholder, failure placeholder)?
    fn can_notify_status_changed(&self, request: &dyn Request) -> bool;

    /// May `request` notify the target that it was cleared?
    fn can_notify_cleared(&self, request: &dyn Request) -> bool;

    /// Has any request in this tree (or an ancestor's) set a resource?
    fn is_any_resource_set(&self) -> bool;

    /// A child completed successfully.
    fn on_request_success(&self, request: &dyn Request);

    /// A child failed terminally.
    fn on_request_failed(&self, request: &dyn Request);
}

/// Returns true if `child` and `request` are the same allocation.
///
/// Coordinators identify which sibling is calling by address; trees are
/// built from fresh allocations per compile, so addresses are stable and
/// unambiguous for the tree's lifetime.
pub(crate) fn is_same_request(child: &Arc<dyn Request>, request: &dyn Request) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(child), request as *const dyn Request)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;

    impl Request for Inert {
        fn begin(&self) {}
        fn clear(&self) {}
        fn is_running(&self) -> bool {
            false
        }
        fn is_complete(&self) -> bool {
            false
        }
        fn is_resource_set(&self) -> bool {
            false
        }
        fn is_cleared(&self) -> bool {
            false
        }
        fn is_failed(&self) -> bool {
            false
        }
        fn is_equivalent_to(&self, _other: &dyn Request) -> bool {
            false
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_is_same_request_by_address() {
        let a: Arc<dyn Request> = Arc::new(Inert);
        let b: Arc<dyn Request> = Arc::new(Inert);

        assert!(is_same_request(&a, a.as_ref()));
        assert!(!is_same_request(&a, b.as_ref()));
    }
}
