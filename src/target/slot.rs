//! The per-target attachment point: one slot, one active request.
//!
//! A slot owns the single request tree attached to its target and enforces
//! the reuse policy when a new compile arrives: an equivalent idle request
//! is restarted in place, an equivalent running request is left alone, and
//! anything else replaces the previous tree.
//!
//! Each attachment stamps the slot with a fresh epoch. Engine callbacks for
//! a superseded attachment carry a stale [`EpochGuard`] and become
//! detectable no-ops instead of racing the replacement.

use crate::error::ConfigError;
use crate::request::Request;
use crate::target::Target;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// Monotonic source of attachment epochs, shared by all slots.
static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Epoch 0 means "nothing attached"; no guard is ever minted with it.
const EPOCH_CLEARED: u64 = 0;

/// Stamp tying a compiled request tree to one attachment of one slot.
///
/// The guard is current while the slot's epoch still equals the generation
/// minted at compile time. Requests check it before acting on an engine
/// callback, so results for a replaced attachment are dropped.
#[derive(Clone, Debug)]
pub struct EpochGuard {
    slot_epoch: Arc<AtomicU64>,
    generation: u64,
}

impl EpochGuard {
    /// Returns true while the attachment this guard was minted for is still
    /// the slot's active one.
    pub fn is_current(&self) -> bool {
        self.slot_epoch.load(Ordering::Acquire) == self.generation
    }

    /// Makes this guard's generation the slot's active epoch.
    fn activate(&self) {
        self.slot_epoch.store(self.generation, Ordering::Release);
    }

    /// A guard for a request that is not attached to any slot (submitted
    /// loads). Active from creation; only [`crate::request::Request::clear`]
    /// ends such a request.
    pub(crate) fn standalone() -> Self {
        let generation = NEXT_EPOCH.fetch_add(1, Ordering::Relaxed);
        Self {
            slot_epoch: Arc::new(AtomicU64::new(generation)),
            generation,
        }
    }
}

#[cfg(test)]
impl EpochGuard {
    /// A guard that is already active, for tests that exercise a request
    /// outside any slot.
    pub(crate) fn always_current() -> Self {
        Self::for_test(1)
    }

    /// A guard at an explicit generation, already active.
    pub(crate) fn for_test(generation: u64) -> Self {
        Self {
            slot_epoch: Arc::new(AtomicU64::new(generation)),
            generation,
        }
    }

    /// Moves the slot's epoch past this guard, making it stale.
    pub(crate) fn advance_for_test(&self) {
        self.slot_epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// What [`TargetSlot::install`] did with the incoming request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The new request was attached and begun.
    Started,
    /// An equivalent idle request was already attached; it was restarted in
    /// place and the new request discarded.
    RestartedPrevious,
    /// An equivalent request was already running; nothing was changed.
    LeftRunning,
}

/// Binds one [`Target`] to at most one active request tree.
///
/// A slot is owned by the thread that created it; `install` and `clear`
/// from any other thread fail with [`ConfigError::WrongThread`]. Engine
/// callbacks are exempt because they reach the slot only through the
/// epoch-stamped request tree, never through the slot itself.
pub struct TargetSlot {
    target: Arc<dyn Target>,
    active: Mutex<Option<Arc<dyn Request>>>,
    epoch: Arc<AtomicU64>,
    owner: ThreadId,
}

impl TargetSlot {
    /// Creates an empty slot owned by the calling thread.
    pub fn new(target: Arc<dyn Target>) -> Self {
        Self {
            target,
            active: Mutex::new(None),
            epoch: Arc::new(AtomicU64::new(EPOCH_CLEARED)),
            owner: thread::current().id(),
        }
    }

    /// The target this slot renders into.
    pub fn target(&self) -> Arc<dyn Target> {
        self.target.clone()
    }

    /// Returns true if a request is currently attached.
    pub fn has_active(&self) -> bool {
        self.active.lock().is_some()
    }

    fn check_thread(&self) -> Result<(), ConfigError> {
        if thread::current().id() == self.owner {
            Ok(())
        } else {
            Err(ConfigError::WrongThread)
        }
    }

    /// Mints a guard for the next attachment of this slot.
    ///
    /// The guard is not current until the request compiled with it is
    /// actually installed.
    pub(crate) fn mint_epoch(&self) -> Result<EpochGuard, ConfigError> {
        self.check_thread()?;
        Ok(EpochGuard {
            slot_epoch: self.epoch.clone(),
            generation: NEXT_EPOCH.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Attaches `request` to this slot, applying the reuse policy.
    ///
    /// If the previous request is structurally equivalent, the new tree is
    /// discarded: a still-running previous request is left alone, an idle
    /// one is restarted in place (re-delivering its held resource if it had
    /// completed). Otherwise the previous request is cleared and `request`
    /// begun under `guard`'s epoch.
    pub fn install(
        &self,
        request: Arc<dyn Request>,
        guard: &EpochGuard,
    ) -> Result<AttachOutcome, ConfigError> {
        self.check_thread()?;

        enum Plan {
            Reuse(Arc<dyn Request>),
            Replace(Option<Arc<dyn Request>>),
        }

        let plan = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(previous) if previous.is_equivalent_to(request.as_ref()) => {
                    Plan::Reuse(previous.clone())
                }
                _ => Plan::Replace(active.replace(request.clone())),
            }
        };

        let displaced = match plan {
            Plan::Reuse(previous) => {
                if previous.is_running() {
                    debug!("Equivalent request already running; leaving it");
                    return Ok(AttachOutcome::LeftRunning);
                }
                debug!("Equivalent request attached; restarting in place");
                previous.begin();
                return Ok(AttachOutcome::RestartedPrevious);
            }
            Plan::Replace(displaced) => displaced,
        };

        if let Some(previous) = displaced {
            previous.clear();
        }
        guard.activate();
        request.begin();
        Ok(AttachOutcome::Started)
    }

    /// Detaches and clears the active request, if any.
    pub fn clear(&self) -> Result<(), ConfigError> {
        self.check_thread()?;
        let previous = self.active.lock().take();
        self.epoch.store(EPOCH_CLEARED, Ordering::Release);
        if let Some(previous) = previous {
            previous.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRequest, RecordingTarget};

    fn slot() -> TargetSlot {
        TargetSlot::new(RecordingTarget::with_size(10, 10))
    }

    #[test]
    fn test_install_into_empty_slot_starts_request() {
        let slot = slot();
        let guard = slot.mint_epoch().unwrap();
        let request = FakeRequest::with_key("a");

        let outcome = slot.install(request.clone(), &guard).unwrap();

        assert_eq!(outcome, AttachOutcome::Started);
        assert_eq!(request.begin_count(), 1);
        assert!(guard.is_current());
        assert!(slot.has_active());
    }

    #[test]
    fn test_equivalent_idle_request_is_restarted_in_place() {
        let slot = slot();
        let guard = slot.mint_epoch().unwrap();
        let first = FakeRequest::with_key("a");
        slot.install(first.clone(), &guard).unwrap();
        first.set_running(false);

        let guard2 = slot.mint_epoch().unwrap();
        let second = FakeRequest::with_key("a");
        let outcome = slot.install(second.clone(), &guard2).unwrap();

        assert_eq!(outcome, AttachOutcome::RestartedPrevious);
        assert_eq!(first.begin_count(), 2);
        assert_eq!(second.begin_count(), 0);
        // The original attachment's epoch is still the active one.
        assert!(guard.is_current());
        assert!(!guard2.is_current());
    }

    #[test]
    fn test_equivalent_running_request_is_left_alone() {
        let slot = slot();
        let guard = slot.mint_epoch().unwrap();
        let first = FakeRequest::with_key("a");
        slot.install(first.clone(), &guard).unwrap();

        let guard2 = slot.mint_epoch().unwrap();
        let second = FakeRequest::with_key("a");
        let outcome = slot.install(second.clone(), &guard2).unwrap();

        assert_eq!(outcome, AttachOutcome::LeftRunning);
        assert_eq!(first.begin_count(), 1);
        assert_eq!(second.begin_count(), 0);
    }

    #[test]
    fn test_different_request_replaces_previous() {
        let slot = slot();
        let guard = slot.mint_epoch().unwrap();
        let first = FakeRequest::with_key("a");
        slot.install(first.clone(), &guard).unwrap();

        let guard2 = slot.mint_epoch().unwrap();
        let second = FakeRequest::with_key("b");
        let outcome = slot.install(second.clone(), &guard2).unwrap();

        assert_eq!(outcome, AttachOutcome::Started);
        assert_eq!(first.clear_count(), 1);
        assert_eq!(second.begin_count(), 1);
        assert!(!guard.is_current());
        assert!(guard2.is_current());
    }

    #[test]
    fn test_clear_detaches_and_invalidates_epoch() {
        let slot = slot();
        let guard = slot.mint_epoch().unwrap();
        let request = FakeRequest::with_key("a");
        slot.install(request.clone(), &guard).unwrap();

        slot.clear().unwrap();

        assert_eq!(request.clear_count(), 1);
        assert!(!guard.is_current());
        assert!(!slot.has_active());

        // Clearing an empty slot is fine.
        slot.clear().unwrap();
    }

    #[test]
    fn test_wrong_thread_is_rejected() {
        let slot = slot();
        let request = FakeRequest::with_key("a");
        let guard = slot.mint_epoch().unwrap();

        thread::scope(|scope| {
            scope
                .spawn(|| {
                    assert_eq!(slot.mint_epoch().unwrap_err(), ConfigError::WrongThread);
                    assert_eq!(
                        slot.install(request.clone(), &guard).unwrap_err(),
                        ConfigError::WrongThread
                    );
                    assert_eq!(slot.clear().unwrap_err(), ConfigError::WrongThread);
                })
                .join()
                .unwrap();
        });

        // Still usable from the owner thread.
        assert_eq!(
            slot.install(request, &guard).unwrap(),
            AttachOutcome::Started
        );
    }

    #[test]
    fn test_epochs_are_globally_unique() {
        let slot_a = slot();
        let slot_b = slot();
        let a = slot_a.mint_epoch().unwrap();
        let b = slot_b.mint_epoch().unwrap();
        assert_ne!(a.generation, b.generation);
    }
}
