//! The primitive runnable request and its state machine.
//!
//! A [`SingleRequest`] owns one fetch: it resolves its dimensions (explicit
//! override or asynchronous target measurement), submits the fetch to the
//! engine with a cancellation token, and routes the terminal callback
//! through its coordinator's gates before touching the target.
//!
//! # States
//!
//! ```text
//! Pending ──begin──► Running ──► Complete
//!                       │    └──► Failed ──begin──► Running (retry)
//!                       └─────────────────clear──► Cleared
//! ```
//!
//! `begin` on a `Complete` request re-delivers the held resource as a
//! memory-cache hit; this is what makes the slot's restart-in-place reuse
//! policy observable to listeners and targets.

use crate::engine::{Engine, EngineKey, FetchSpec, ResourceCallback, SIZE_ORIGINAL};
use crate::error::LoadError;
use crate::model::Model;
use crate::request::listener::RequestListener;
use crate::request::options::{LoadOptions, Priority, SizeOverride, Transition};
use crate::request::traits::{Request, RequestCoordinator};
use crate::resource::Resource;
use crate::target::slot::EpochGuard;
use crate::target::Target;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lifecycle state of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Compiled but not yet begun.
    Pending,
    /// Work in flight (measuring the target or fetching).
    Running,
    /// A resource was produced.
    Complete,
    /// The fetch failed terminally.
    Failed,
    /// Cancelled and detached; terminal for this object until restarted
    /// by a fresh compile.
    Cleared,
}

/// Immutable per-compile snapshot configuring one [`SingleRequest`].
///
/// The priority, override and transition here are the *effective* values
/// after the compiler applied the bump and inheritance rules; `options`
/// retains the raw snapshot for equivalence comparison and cache directives.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSpec {
    /// What to load.
    pub model: Model,
    /// Option snapshot from the builder.
    pub options: LoadOptions,
    /// Effective scheduling priority.
    pub priority: Priority,
    /// Effective dimension override, if any.
    pub size_override: Option<SizeOverride>,
    /// Effective transition for displaying the result.
    pub transition: Transition,
}

impl LoadSpec {
    /// Returns the dimensions to fetch at, if they are known without
    /// measuring the target.
    fn known_dimensions(&self) -> Option<(u32, u32)> {
        match self.size_override {
            Some(SizeOverride::Original) => Some((SIZE_ORIGINAL, SIZE_ORIGINAL)),
            Some(SizeOverride::Pixels { width, height }) if width > 0 && height > 0 => {
                Some((width, height))
            }
            _ => None,
        }
    }
}

struct Inner {
    status: Status,
    resource: Option<Resource>,
    cancel: Option<CancellationToken>,
    fetch_submitted: bool,
}

/// The compiled, runnable unit: one fetch bound to one target slot.
pub struct SingleRequest {
    spec: LoadSpec,
    target: Arc<dyn Target>,
    listeners: Vec<Arc<dyn RequestListener>>,
    coordinator: Option<Weak<dyn RequestCoordinator>>,
    engine: Arc<dyn Engine>,
    epoch: EpochGuard,
    weak_self: Weak<SingleRequest>,
    inner: Mutex<Inner>,
}

impl SingleRequest {
    /// Creates a new request in the `Pending` state.
    pub(crate) fn new(
        spec: LoadSpec,
        target: Arc<dyn Target>,
        listeners: Vec<Arc<dyn RequestListener>>,
        coordinator: Option<Weak<dyn RequestCoordinator>>,
        engine: Arc<dyn Engine>,
        epoch: EpochGuard,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            spec,
            target,
            listeners,
            coordinator,
            engine,
            epoch,
            weak_self: weak_self.clone(),
            inner: Mutex::new(Inner {
                status: Status::Pending,
                resource: None,
                cancel: None,
                fetch_submitted: false,
            }),
        })
    }

    /// Returns the spec this request was compiled from.
    pub fn spec(&self) -> &LoadSpec {
        &self.spec
    }

    /// Returns the current lifecycle status.
    pub fn status(&self) -> Status {
        self.inner.lock().status
    }

    // Coordinator gates. A request with no coordinator always may.

    fn can_set_image(&self) -> bool {
        match &self.coordinator {
            Some(coordinator) => coordinator
                .upgrade()
                .map_or(true, |c| c.can_set_image(self)),
            None => true,
        }
    }

    fn can_notify_status_changed(&self) -> bool {
        match &self.coordinator {
            Some(coordinator) => coordinator
                .upgrade()
                .map_or(true, |c| c.can_notify_status_changed(self)),
            None => true,
        }
    }

    fn can_notify_cleared(&self) -> bool {
        match &self.coordinator {
            Some(coordinator) => coordinator
                .upgrade()
                .map_or(true, |c| c.can_notify_cleared(self)),
            None => true,
        }
    }

    fn notify_success(&self) {
        if let Some(coordinator) = self.coordinator.as_ref().and_then(Weak::upgrade) {
            coordinator.on_request_success(self);
        }
    }

    fn notify_failure(&self) {
        if let Some(coordinator) = self.coordinator.as_ref().and_then(Weak::upgrade) {
            coordinator.on_request_failed(self);
        }
    }

    /// Receives the measured target size and submits the fetch.
    ///
    /// Ignored unless the request is still running and has not already
    /// submitted; late size callbacks after a clear are no-ops.
    fn on_size_ready(&self, width: u32, height: u32) {
        let cancel = {
            let mut inner = self.inner.lock();
            if inner.status != Status::Running || inner.fetch_submitted {
                return;
            }
            inner.fetch_submitted = true;
            match &inner.cancel {
                Some(token) => token.clone(),
                None => return,
            }
        };

        let multiplier = self.spec.options.size_multiplier;
        let key = EngineKey {
            model: self.spec.model.clone(),
            width: scaled_dimension(width, multiplier),
            height: scaled_dimension(height, multiplier),
            transformation: self.spec.options.transformation,
        };
        debug!(
            key = %key,
            priority = ?self.spec.priority,
            "Submitting fetch to engine"
        );

        let callback: Weak<dyn ResourceCallback> = self.weak_self.clone();
        self.engine.fetch(
            FetchSpec {
                key,
                priority: self.spec.priority,
                cache: self.spec.options.cache,
            },
            callback,
            cancel,
        );
    }

    /// Delivers a produced resource through the coordinator gates.
    fn deliver_resource(&self, resource: Resource) {
        if !self.can_set_image() {
            // A sibling owns the display; complete silently without
            // touching the target.
            self.inner.lock().status = Status::Complete;
            debug!(model = %self.spec.model, "Resource ready but sibling owns the display");
            return;
        }

        {
            let mut inner = self.inner.lock();
            inner.status = Status::Complete;
            inner.resource = Some(resource.clone());
        }
        debug!(
            model = %self.spec.model,
            width = resource.width,
            height = resource.height,
            source = ?resource.source,
            "Resource ready"
        );

        let mut consumed = false;
        for listener in &self.listeners {
            consumed |= listener.on_resource_ready(&resource, &self.spec.model);
        }
        if !consumed {
            self.target.on_resource_ready(&resource, self.spec.transition);
        }

        self.notify_success();
    }
}

impl Request for SingleRequest {
    fn begin(&self) {
        enum Action {
            Start,
            Redeliver(Option<Resource>),
            Skip(&'static str),
        }

        let action = {
            let mut inner = self.inner.lock();
            match inner.status {
                Status::Running => Action::Skip("already running"),
                Status::Cleared => Action::Skip("already cleared"),
                Status::Complete => Action::Redeliver(inner.resource.clone()),
                Status::Pending | Status::Failed => {
                    inner.status = Status::Running;
                    inner.fetch_submitted = false;
                    inner.cancel = Some(CancellationToken::new());
                    Action::Start
                }
            }
        };

        match action {
            Action::Skip(reason) => {
                warn!(model = %self.spec.model, reason, "Ignoring begin()");
            }
            Action::Redeliver(Some(resource)) => {
                debug!(model = %self.spec.model, "Re-delivering held resource");
                self.deliver_resource(resource.as_memory_cache_hit());
            }
            Action::Redeliver(None) => {
                // Completed without the display (a sibling won); nothing
                // to re-deliver.
            }
            Action::Start => {
                debug!(
                    model = %self.spec.model,
                    priority = ?self.spec.priority,
                    "Beginning request"
                );
                match self.spec.known_dimensions() {
                    Some((width, height)) => self.on_size_ready(width, height),
                    None => {
                        let weak = self.weak_self.clone();
                        self.target.get_size(Box::new(move |width, height| {
                            if let Some(request) = weak.upgrade() {
                                request.on_size_ready(width, height);
                            }
                        }));
                    }
                }
                if self.can_notify_status_changed() {
                    self.target.on_load_started();
                }
            }
        }
    }

    fn clear(&self) {
        let cancel = {
            let mut inner = self.inner.lock();
            if inner.status == Status::Cleared {
                return;
            }
            inner.status = Status::Cleared;
            inner.resource = None;
            inner.fetch_submitted = false;
            inner.cancel.take()
        };

        if let Some(token) = cancel {
            token.cancel();
        }
        if self.can_notify_cleared() {
            self.target.on_load_cleared();
        }
        debug!(model = %self.spec.model, "Request cleared");
    }

    fn is_running(&self) -> bool {
        self.inner.lock().status == Status::Running
    }

    fn is_complete(&self) -> bool {
        self.inner.lock().status == Status::Complete
    }

    fn is_resource_set(&self) -> bool {
        self.inner.lock().resource.is_some()
    }

    fn is_cleared(&self) -> bool {
        self.inner.lock().status == Status::Cleared
    }

    fn is_failed(&self) -> bool {
        self.inner.lock().status == Status::Failed
    }

    fn is_equivalent_to(&self, other: &dyn Request) -> bool {
        match other.as_any().downcast_ref::<SingleRequest>() {
            Some(other) => {
                self.spec == other.spec && self.listeners.len() == other.listeners.len()
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ResourceCallback for SingleRequest {
    fn on_fetch_complete(&self, resource: Resource) {
        if !self.epoch.is_current() {
            debug!(model = %self.spec.model, "Dropping stale fetch result");
            return;
        }
        if self.inner.lock().status != Status::Running {
            debug!(model = %self.spec.model, "Dropping fetch result for non-running request");
            return;
        }
        self.deliver_resource(resource);
    }

    fn on_fetch_failed(&self, error: LoadError) {
        if !self.epoch.is_current() {
            debug!(model = %self.spec.model, "Dropping stale fetch failure");
            return;
        }
        {
            let mut inner = self.inner.lock();
            if inner.status != Status::Running {
                return;
            }
            inner.status = Status::Failed;
        }
        warn!(model = %self.spec.model, error = %error, "Load failed");

        // The coordinator updates its gates (and may start an error
        // sibling) before we decide whether this failure is the tree's
        // terminal notification.
        self.notify_failure();

        if self.can_notify_status_changed() {
            let mut consumed = false;
            for listener in &self.listeners {
                consumed |= listener.on_load_failed(&error, &self.spec.model);
            }
            if !consumed {
                self.target.on_load_failed(&error);
            }
        }
    }
}

/// Applies a thumbnail size multiplier to one dimension.
///
/// The natural-size sentinel passes through untouched; scaled dimensions
/// never collapse below one pixel.
fn scaled_dimension(dimension: u32, multiplier: f32) -> u32 {
    if dimension == SIZE_ORIGINAL || multiplier == 1.0 {
        dimension
    } else {
        ((dimension as f32 * multiplier).round() as u32).max(1)
    }
}
