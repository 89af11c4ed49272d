//! Shared fakes for unit tests: a recording target, a hand-cranked engine
//! and inert request/coordinator stand-ins.

use crate::engine::{Engine, FetchSpec, ResourceCallback};
use crate::error::LoadError;
use crate::model::Model;
use crate::request::{Request, RequestCoordinator, RequestListener, Transition};
use crate::resource::{DataSource, Resource};
use crate::target::{SizeCallback, Target};
use bytes::Bytes;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

pub(crate) fn make_resource(width: u32, height: u32, source: DataSource) -> Resource {
    Resource::new(Bytes::from_static(b"pixels"), width, height, source)
}

/// Everything a [`RecordingTarget`] was told, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TargetEvent {
    Started,
    Ready {
        width: u32,
        height: u32,
        source: DataSource,
    },
    Failed(String),
    Cleared,
}

/// Target that records its callbacks and can defer size measurement.
pub(crate) struct RecordingTarget {
    size: Option<(u32, u32)>,
    pending: Mutex<Vec<SizeCallback>>,
    events: Mutex<Vec<TargetEvent>>,
}

impl RecordingTarget {
    /// A target whose size is known immediately.
    pub(crate) fn with_size(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            size: Some((width, height)),
            pending: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        })
    }

    /// A target still waiting on layout; size arrives via
    /// [`Self::deliver_size`].
    pub(crate) fn unmeasured() -> Arc<Self> {
        Arc::new(Self {
            size: None,
            pending: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        })
    }

    /// Delivers a deferred measurement to every waiting callback.
    pub(crate) fn deliver_size(&self, width: u32, height: u32) {
        let callbacks: Vec<SizeCallback> = self.pending.lock().drain(..).collect();
        for callback in callbacks {
            callback(width, height);
        }
    }

    pub(crate) fn events(&self) -> Vec<TargetEvent> {
        self.events.lock().clone()
    }

    fn count(&self, matches: impl Fn(&TargetEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| matches(e)).count()
    }

    pub(crate) fn ready_count(&self) -> usize {
        self.count(|e| matches!(e, TargetEvent::Ready { .. }))
    }

    pub(crate) fn failed_count(&self) -> usize {
        self.count(|e| matches!(e, TargetEvent::Failed(_)))
    }

    pub(crate) fn cleared_count(&self) -> usize {
        self.count(|e| matches!(e, TargetEvent::Cleared))
    }
}

impl Target for RecordingTarget {
    fn get_size(&self, callback: SizeCallback) {
        match self.size {
            Some((width, height)) => callback(width, height),
            None => self.pending.lock().push(callback),
        }
    }

    fn on_load_started(&self) {
        self.events.lock().push(TargetEvent::Started);
    }

    fn on_resource_ready(&self, resource: &Resource, _transition: Transition) {
        self.events.lock().push(TargetEvent::Ready {
            width: resource.width,
            height: resource.height,
            source: resource.source,
        });
    }

    fn on_load_failed(&self, error: &LoadError) {
        self.events
            .lock()
            .push(TargetEvent::Failed(error.message.clone()));
    }

    fn on_load_cleared(&self) {
        self.events.lock().push(TargetEvent::Cleared);
    }
}

struct PendingFetch {
    spec: FetchSpec,
    callback: Weak<dyn ResourceCallback>,
    cancel: CancellationToken,
}

/// Engine whose fetches sit in a queue until the test resolves them.
///
/// `complete_at`/`fail_at` consume the entry and invoke the callback even
/// if its token was cancelled, so tests can exercise the callback-races-
/// clear path; the request's own state machine is what drops the result.
pub(crate) struct ManualEngine {
    pending: Mutex<Vec<PendingFetch>>,
}

impl ManualEngine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub(crate) fn spec_at(&self, index: usize) -> FetchSpec {
        self.pending.lock()[index].spec.clone()
    }

    pub(crate) fn cancel_at(&self, index: usize) -> CancellationToken {
        self.pending.lock()[index].cancel.clone()
    }

    /// Resolves the fetch at `index` with a resource. Returns true if the
    /// callback was still alive to receive it.
    pub(crate) fn complete_at(&self, index: usize, resource: Resource) -> bool {
        let fetch = self.pending.lock().remove(index);
        match fetch.callback.upgrade() {
            Some(callback) => {
                callback.on_fetch_complete(resource);
                true
            }
            None => false,
        }
    }

    /// Resolves the fetch at `index` with an error. Returns true if the
    /// callback was still alive to receive it.
    pub(crate) fn fail_at(&self, index: usize, error: LoadError) -> bool {
        let fetch = self.pending.lock().remove(index);
        match fetch.callback.upgrade() {
            Some(callback) => {
                callback.on_fetch_failed(error);
                true
            }
            None => false,
        }
    }
}

impl Engine for ManualEngine {
    fn fetch(
        &self,
        spec: FetchSpec,
        callback: Weak<dyn ResourceCallback>,
        cancel: CancellationToken,
    ) {
        self.pending.lock().push(PendingFetch {
            spec,
            callback,
            cancel,
        });
    }
}

/// Listener that counts callbacks and either consumes events or passes
/// them through to the target.
pub(crate) struct CountingListener {
    consume: bool,
    ready: AtomicUsize,
    failed: AtomicUsize,
}

impl CountingListener {
    pub(crate) fn consuming() -> Arc<Self> {
        Arc::new(Self {
            consume: true,
            ready: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    pub(crate) fn pass_through() -> Arc<Self> {
        Arc::new(Self {
            consume: false,
            ready: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    pub(crate) fn ready_count(&self) -> usize {
        self.ready.load(Ordering::Relaxed)
    }

    pub(crate) fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

impl RequestListener for CountingListener {
    fn on_resource_ready(&self, _resource: &Resource, _model: &Model) -> bool {
        self.ready.fetch_add(1, Ordering::Relaxed);
        self.consume
    }

    fn on_load_failed(&self, _error: &LoadError, _model: &Model) -> bool {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.consume
    }
}

static NEXT_FAKE_KEY: AtomicU64 = AtomicU64::new(0);

/// Request stand-in with externally scripted state.
///
/// Equivalence compares keys: `with_key` builds comparable requests,
/// `new` mints a unique key so fresh fakes never match each other.
pub(crate) struct FakeRequest {
    key: String,
    running: AtomicBool,
    complete: AtomicBool,
    resource_set: AtomicBool,
    cleared: AtomicBool,
    failed: AtomicBool,
    begins: AtomicUsize,
    clears: AtomicUsize,
}

impl FakeRequest {
    pub(crate) fn new() -> Arc<Self> {
        let id = NEXT_FAKE_KEY.fetch_add(1, Ordering::Relaxed);
        Self::with_key(&format!("fake-{id}"))
    }

    pub(crate) fn with_key(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_string(),
            running: AtomicBool::new(false),
            complete: AtomicBool::new(false),
            resource_set: AtomicBool::new(false),
            cleared: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            begins: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set_running(&self, value: bool) {
        self.running.store(value, Ordering::Relaxed);
    }

    pub(crate) fn set_complete(&self, value: bool) {
        self.complete.store(value, Ordering::Relaxed);
    }

    pub(crate) fn set_resource_set(&self, value: bool) {
        self.resource_set.store(value, Ordering::Relaxed);
    }

    pub(crate) fn set_failed(&self, value: bool) {
        self.failed.store(value, Ordering::Relaxed);
    }

    pub(crate) fn begin_count(&self) -> usize {
        self.begins.load(Ordering::Relaxed)
    }

    pub(crate) fn clear_count(&self) -> usize {
        self.clears.load(Ordering::Relaxed)
    }
}

impl Request for FakeRequest {
    fn begin(&self) {
        self.begins.fetch_add(1, Ordering::Relaxed);
        self.running.store(true, Ordering::Relaxed);
        self.cleared.store(false, Ordering::Relaxed);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
        self.cleared.store(true, Ordering::Relaxed);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Relaxed)
    }

    fn is_resource_set(&self) -> bool {
        self.resource_set.load(Ordering::Relaxed)
    }

    fn is_cleared(&self) -> bool {
        self.cleared.load(Ordering::Relaxed)
    }

    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    fn is_equivalent_to(&self, other: &dyn Request) -> bool {
        other
            .as_any()
            .downcast_ref::<FakeRequest>()
            .map_or(false, |other| self.key == other.key)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Coordinator stand-in that either allows or denies everything.
pub(crate) struct StubCoordinator {
    allow: bool,
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl StubCoordinator {
    pub(crate) fn permissive() -> Arc<Self> {
        Arc::new(Self {
            allow: true,
            successes: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    pub(crate) fn denying() -> Arc<Self> {
        Arc::new(Self {
            allow: false,
            successes: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        })
    }

    pub(crate) fn success_count(&self) -> usize {
        self.successes.load(Ordering::Relaxed)
    }

    pub(crate) fn failed_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

impl RequestCoordinator for StubCoordinator {
    fn can_set_image(&self, _request: &dyn Request) -> bool {
        self.allow
    }

    fn can_notify_status_changed(&self, _request: &dyn Request) -> bool {
        self.allow
    }

    fn can_notify_cleared(&self, _request: &dyn Request) -> bool {
        self.allow
    }

    fn is_any_resource_set(&self) -> bool {
        false
    }

    fn on_request_success(&self, _request: &dyn Request) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    fn on_request_failed(&self, _request: &dyn Request) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }
}
