//! Coordinator racing a thumbnail request against the full request.

use crate::request::traits::{is_same_request, Request, RequestCoordinator};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Weak};
use tracing::debug;

#[derive(Clone)]
struct Children {
    full: Arc<dyn Request>,
    thumb: Arc<dyn Request>,
}

struct State {
    children: Option<Children>,
    /// Either child finished; suppresses further status-change
    /// notifications so the target never transitions backwards.
    any_complete: bool,
    /// The full request finished; the thumbnail's image-set permission is
    /// permanently revoked for this coordinator.
    full_finished: bool,
}

/// Runs a full request and a smaller thumbnail request concurrently,
/// displaying whichever finishes first but never regressing once the full
/// result lands.
///
/// No ordering is assumed between the two completions; the rules here
/// resolve the displayed result regardless of arrival order.
pub struct ThumbnailCoordinator {
    parent: Option<Weak<dyn RequestCoordinator>>,
    state: Mutex<State>,
}

impl ThumbnailCoordinator {
    /// Creates an unwired coordinator.
    ///
    /// Both children must be set exactly once via [`Self::wire`] before the
    /// tree is begun.
    pub fn new(parent: Option<Weak<dyn RequestCoordinator>>) -> Arc<Self> {
        Arc::new(Self {
            parent,
            state: Mutex::new(State {
                children: None,
                any_complete: false,
                full_finished: false,
            }),
        })
    }

    /// Wires the full and thumbnail children.
    pub fn wire(&self, full: Arc<dyn Request>, thumb: Arc<dyn Request>) {
        let mut state = self.state.lock();
        debug_assert!(state.children.is_none(), "coordinator wired twice");
        state.children = Some(Children { full, thumb });
    }

    fn children(&self) -> Option<Children> {
        self.state.lock().children.clone()
    }

    pub(crate) fn children_for_equivalence(&self) -> Option<(Arc<dyn Request>, Arc<dyn Request>)> {
        self.children().map(|c| (c.full, c.thumb))
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

impl RequestCoordinator for ThumbnailCoordinator {
    fn can_set_image(&self, request: &dyn Request) -> bool {
        let (children, full_finished) = {
            let state = self.state.lock();
            match &state.children {
                Some(children) => (children.clone(), state.full_finished),
                None => return false,
            }
        };
        if !self.parent_can_set_image() {
            return false;
        }
        if is_same_request(&children.full, request) {
            // The full result always wins.
            return true;
        }
        // The thumbnail may display only while the full request has not
        // finished and nothing in this coordinator has set a resource.
        !full_finished && !children.full.is_resource_set() && !children.thumb.is_resource_set()
    }

    fn can_notify_status_changed(&self, request: &dyn Request) -> bool {
        let (children, any_complete) = {
            let state = self.state.lock();
            match &state.children {
                Some(children) => (children.clone(), state.any_complete),
                None => return false,
            }
        };
        if any_complete || !self.parent_can_notify_status_changed() {
            return false;
        }
        // A thumbnail failure is never the tree's terminal notification;
        // only the full request may surface failure to the target.
        if request.is_failed() {
            return is_same_request(&children.full, request);
        }
        true
    }

    fn can_notify_cleared(&self, request: &dyn Request) -> bool {
        let children = match self.children() {
            Some(children) => children,
            None => return false,
        };
        self.parent_can_notify_cleared() && is_same_request(&children.full, request)
    }

    fn is_any_resource_set(&self) -> bool {
        let children = match self.children() {
            Some(children) => children,
            None => return false,
        };
        self.parent_is_any_resource_set()
            || children.full.is_resource_set()
            || children.thumb.is_resource_set()
    }

    fn on_request_success(&self, request: &dyn Request) {
        let (children, is_full) = {
            let mut state = self.state.lock();
            let children = match &state.children {
                Some(children) => children.clone(),
                None => return,
            };
            let is_full = is_same_request(&children.full, request);
            state.any_complete = true;
            if is_full {
                state.full_finished = true;
            }
            (children, is_full)
        };

        if !is_full {
            debug!("Thumbnail finished first");
            return;
        }

        debug!("Full request finished; thumbnail permanently superseded");
        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.on_request_success(self);
        }
        // The thumbnail fetch is pointless now; a completed thumbnail is
        // left alone because its resource may still be mid-transition.
        if !children.thumb.is_complete() {
            children.thumb.clear();
        }
    }

    fn on_request_failed(&self, request: &dyn Request) {
        let children = match self.children() {
            Some(children) => children,
            None => return,
        };
        // Thumbnail failures are absorbed; the full request decides the
        // tree's fate.
        if is_same_request(&children.full, request) {
            if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
                parent.on_request_failed(self);
            }
        }
    }
}

impl Request for ThumbnailCoordinator {
    fn begin(&self) {
        let children = {
            let mut state = self.state.lock();
            state.any_complete = false;
            state.full_finished = false;
            match &state.children {
                Some(children) => children.clone(),
                None => return,
            }
        };
        if !children.thumb.is_running() {
            children.thumb.begin();
        }
        if !children.full.is_running() {
            children.full.begin();
        }
    }

    fn clear(&self) {
        if let Some(children) = self.children() {
            children.full.clear();
            children.thumb.clear();
        }
    }

    fn is_running(&self) -> bool {
        self.children().map_or(false, |c| c.full.is_running())
    }

    fn is_complete(&self) -> bool {
        self.children()
            .map_or(false, |c| c.full.is_complete() || c.thumb.is_complete())
    }

    fn is_resource_set(&self) -> bool {
        self.children().map_or(false, |c| {
            c.full.is_resource_set() || c.thumb.is_resource_set()
        })
    }

    fn is_cleared(&self) -> bool {
        self.children().map_or(false, |c| c.full.is_cleared())
    }

    fn is_failed(&self) -> bool {
        self.children().map_or(false, |c| c.full.is_failed())
    }

    fn is_equivalent_to(&self, other: &dyn Request) -> bool {
        let other = match other.as_any().downcast_ref::<ThumbnailCoordinator>() {
            Some(other) => other,
            None => return false,
        };
        match (self.children(), other.children()) {
            (Some(a), Some(b)) => {
                a.full.is_equivalent_to(b.full.as_ref())
                    && a.thumb.is_equivalent_to(b.thumb.as_ref())
            }
            (None, None) => true,
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
