//! Coordinator running an error fallback request after a primary failure.

use crate::request::traits::{is_same_request, Request, RequestCoordinator};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Clone)]
struct Children {
    primary: Arc<dyn Request>,
    error: Arc<dyn Request>,
}

struct State {
    children: Option<Children>,
    /// Set when the primary signals failure; from then on only the error
    /// child may act on the target.
    primary_failed: bool,
}

/// Runs the error fallback chain only after the primary request has
/// definitively failed, and guarantees a single terminal notification for
/// the pair.
pub struct ErrorCoordinator {
    parent: Option<Weak<dyn RequestCoordinator>>,
    state: Mutex<State>,
}

impl ErrorCoordinator {
    /// Creates an unwired coordinator.
    ///
    /// Both children must be set exactly once via [`Self::wire`] before the
    /// tree is begun.
    pub fn new(parent: Option<Weak<dyn RequestCoordinator>>) -> Arc<Self> {
        Arc::new(Self {
            parent,
            state: Mutex::new(State {
                children: None,
                primary_failed: false,
            }),
        })
    }

    /// Wires the primary and error children.
    pub fn wire(&self, primary: Arc<dyn Request>, error: Arc<dyn Request>) {
        let mut state = self.state.lock();
        debug_assert!(state.children.is_none(), "coordinator wired twice");
        state.children = Some(Children { primary, error });
    }

    fn children(&self) -> Option<Children> {
        self.state.lock().children.clone()
    }

    pub(crate) fn children_for_equivalence(&self) -> Option<(Arc<dyn Request>, Arc<dyn Request>)> {
        self.children().map(|c| (c.primary, c.error))
    }

    /// The failed-primary gate: before the primary fails only the primary
    /// may act, afterwards only the error child.
    fn is_valid_request(&self, request: &dyn Request) -> bool {
        let state = self.state.lock();
        let children = match &state.children {
            Some(children) => children,
            None => return false,
        };
        if state.primary_failed {
            is_same_request(&children.error, request)
        } else {
            is_same_request(&children.primary, request)
        }
    }

    fn parent_can_set_image(&self) -> bool {
        match &self.parent {
            Some(parent) => parent.upgrade().map_or(true, |p| p.can_set_image(self)),
            None => true,
        }
    }

    fn parent_can_notify_status_changed(&self) -> bool {
        match &self.parent {
            Some(parent) => parent
                .upgrade()
                .map_or(true, |p| p.can_notify_status_changed(self)),
            None => true,
        }
    }

    fn parent_can_notify_cleared(&self) -> bool {
        match &self.parent {
            Some(parent) => parent
                .upgrade()
                .map_or(true, |p| p.can_notify_cleared(self)),
            None => true,
        }
    }

    fn parent_is_any_resource_set(&self) -> bool {
        match &self.parent {
            Some(parent) => parent.upgrade().map_or(false, |p| p.is_any_resource_set()),
            None => false,
        }
    }
}

impl RequestCoordinator for ErrorCoordinator {
    fn can_set_image(&self, request: &dyn Request) -> bool {
        self.parent_can_set_image() && self.is_valid_request(request)
    }

    fn can_notify_status_changed(&self, request: &dyn Request) -> bool {
        self.parent_can_notify_status_changed() && self.is_valid_request(request)
    }

    fn can_notify_cleared(&self, request: &dyn Request) -> bool {
        self.parent_can_notify_cleared() && self.is_valid_request(request)
    }

    fn is_any_resource_set(&self) -> bool {
        let children = match self.children() {
            Some(children) => children,
            None => return false,
        };
        self.parent_is_any_resource_set()
            || children.primary.is_resource_set()
            || children.error.is_resource_set()
    }

    fn on_request_success(&self, _request: &dyn Request) {
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.on_request_success(self);
        }
    }

    fn on_request_failed(&self, request: &dyn Request) {
        let children = {
            let mut state = self.state.lock();
            let children = match &state.children {
                Some(children) => children.clone(),
                None => return,
            };
            if !is_same_request(&children.error, request) {
                state.primary_failed = true;
            }
            children
        };

        if is_same_request(&children.error, request) {
            // The whole fallback chain failed; let an ancestor (or the
            // error request's own notification) handle it.
            if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
                parent.on_request_failed(self);
            }
            return;
        }

        debug!("Primary request failed; starting error fallback");
        if !children.error.is_running() {
            children.error.begin();
        }
    }
}

impl Request for ErrorCoordinator {
    fn begin(&self) {
        let children = {
            let mut state = self.state.lock();
            state.primary_failed = false;
            match &state.children {
                Some(children) => children.clone(),
                None => return,
            }
        };
        children.primary.begin();
    }

    fn clear(&self) {
        if let Some(children) = self.children() {
            children.primary.clear();
            children.error.clear();
        }
    }

    fn is_running(&self) -> bool {
        let (children, primary_failed) = {
            let state = self.state.lock();
            match &state.children {
                Some(children) => (children.clone(), state.primary_failed),
                None => return false,
            }
        };
        if primary_failed {
            children.error.is_running()
        } else {
            children.primary.is_running()
        }
    }

    fn is_complete(&self) -> bool {
        self.children()
            .map_or(false, |c| c.primary.is_complete() || c.error.is_complete())
    }

    fn is_resource_set(&self) -> bool {
        self.children().map_or(false, |c| {
            c.primary.is_resource_set() || c.error.is_resource_set()
        })
    }

    fn is_cleared(&self) -> bool {
        self.children().map_or(false, |c| c.primary.is_cleared())
    }

    fn is_failed(&self) -> bool {
        self.children()
            .map_or(false, |c| c.primary.is_failed() && c.error.is_failed())
    }

    fn is_equivalent_to(&self, other: &dyn Request) -> bool {
        let other = match other.as_any().downcast_ref::<ErrorCoordinator>() {
            Some(other) => other,
            None => return false,
        };
        match (self.children(), other.children()) {
            (Some(a), Some(b)) => {
                a.primary.is_equivalent_to(b.primary.as_ref())
                    && a.error.is_equivalent_to(b.error.as_ref())
            }
            (None, None) => true,
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
