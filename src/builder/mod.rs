//! The fluent request builder and its compiler.
//!
//! A [`RequestBuilder`] accumulates options through chained calls and
//! compiles into a request tree on attach. Compilation is recursive: an
//! error fallback chain wraps the primary subtree in an
//! [`ErrorCoordinator`], a thumbnail (either a nested builder or a bare
//! size multiplier) wraps it in a [`ThumbnailCoordinator`], and the plain
//! case produces a bare [`SingleRequest`] with no coordinator at all.
//!
//! # Cloning and identity
//!
//! `clone()` produces an alias of the same logical builder: using a clone
//! as its own thumbnail is the self-reference misconfiguration and is
//! rejected at compile time. [`RequestBuilder::fork`] produces a builder
//! with the same options but a fresh identity, which is the supported way
//! to reuse a configured chain as a child of itself.

use crate::engine::Engine;
use crate::error::ConfigError;
use crate::model::Model;
use crate::request::{
    ErrorCoordinator, LoadOptions, LoadSpec, Priority, Request, RequestCoordinator,
    RequestListener, SingleRequest, SizeOverride, ThumbnailCoordinator, Transformation,
    Transition,
};
use crate::target::future::FutureTarget;
use crate::target::{AttachOutcome, EpochGuard, LoadFuture, Target, TargetSlot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(1);

fn next_builder_id() -> u64 {
    NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Chainable configuration for one load, compiled into a request tree on
/// attach.
#[derive(Clone)]
pub struct RequestBuilder {
    engine: Arc<dyn Engine>,
    /// Logical identity; preserved by `clone()`, refreshed by `fork()`.
    id: u64,
    model: Option<Model>,
    options: LoadOptions,
    transition: Transition,
    /// Whether `transition` was set explicitly; an unset transition is
    /// inherited when this builder compiles as a thumbnail child.
    transition_set: bool,
    listeners: Vec<Arc<dyn RequestListener>>,
    thumbnail: Option<Box<RequestBuilder>>,
    thumbnail_multiplier: Option<f32>,
    error: Option<Box<RequestBuilder>>,
}

impl RequestBuilder {
    /// Creates an empty builder bound to an engine.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            id: next_builder_id(),
            model: None,
            options: LoadOptions::default(),
            transition: Transition::default(),
            transition_set: false,
            listeners: Vec::new(),
            thumbnail: None,
            thumbnail_multiplier: None,
            error: None,
        }
    }

    /// Returns a copy with the same options but a fresh identity, safe to
    /// use as this builder's own thumbnail or error chain.
    pub fn fork(&self) -> Self {
        let mut copy = self.clone();
        copy.id = next_builder_id();
        copy
    }

    /// Sets what to load. Required before any attach.
    pub fn load(mut self, model: impl Into<Model>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Pins the scheduling priority.
    ///
    /// An unpinned thumbnail child otherwise runs one step above its
    /// parent per [`Priority::bumped`].
    pub fn priority(mut self, priority: Priority) -> Self {
        self.options.priority = Some(priority);
        self
    }

    /// Loads at explicit pixel dimensions instead of measuring the target.
    pub fn override_size(mut self, width: u32, height: u32) -> Self {
        self.options.size_override = Some(SizeOverride::Pixels { width, height });
        self
    }

    /// Loads at the source's natural size.
    pub fn override_original(mut self) -> Self {
        self.options.size_override = Some(SizeOverride::Original);
        self
    }

    /// Sets the fit transformation baked into the decoded result.
    pub fn transform(mut self, transformation: Transformation) -> Self {
        self.options.transformation = Some(transformation);
        self
    }

    /// Sets how the delivered resource replaces what the target shows.
    pub fn transition(mut self, transition: Transition) -> Self {
        self.transition = transition;
        self.transition_set = true;
        self
    }

    /// Skips the in-memory cache for this load.
    pub fn skip_memory_cache(mut self, skip: bool) -> Self {
        self.options.cache.skip_memory_cache = skip;
        self
    }

    /// Skips the on-disk cache for this load.
    pub fn skip_disk_cache(mut self, skip: bool) -> Self {
        self.options.cache.skip_disk_cache = skip;
        self
    }

    /// Adds a listener; listeners run before the target and may consume
    /// events.
    pub fn listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Races `thumbnail`'s chain against this request; see
    /// [`ThumbnailCoordinator`].
    pub fn thumbnail(mut self, thumbnail: RequestBuilder) -> Self {
        self.thumbnail = Some(Box::new(thumbnail));
        self
    }

    /// Races a scaled-down copy of this request as the thumbnail.
    ///
    /// `multiplier` must be in `(0, 1]`; validated at compile time. Ignored
    /// if a full thumbnail builder is also set.
    pub fn thumbnail_multiplier(mut self, multiplier: f32) -> Self {
        self.thumbnail_multiplier = Some(multiplier);
        self
    }

    /// Starts `error`'s chain if this request fails terminally; see
    /// [`ErrorCoordinator`].
    pub fn error(mut self, error: RequestBuilder) -> Self {
        self.error = Some(Box::new(error));
        self
    }

    /// Compiles this builder and attaches the result to `slot`, applying
    /// the slot's reuse policy.
    pub fn into_slot(&self, slot: &TargetSlot) -> Result<AttachOutcome, ConfigError> {
        let guard = slot.mint_epoch()?;
        let request = self.compile(slot.target(), &guard)?;
        slot.install(request, &guard)
    }

    /// Compiles this builder against a hidden target of the given
    /// dimensions and begins it, returning an awaitable handle.
    pub fn submit(&self, width: u32, height: u32) -> Result<LoadFuture, ConfigError> {
        let (target, receiver) = FutureTarget::channel(width, height);
        let guard = EpochGuard::standalone();
        let request = self.compile(target, &guard)?;
        request.begin();
        Ok(LoadFuture::new(receiver, request))
    }

    fn compile(
        &self,
        target: Arc<dyn Target>,
        guard: &EpochGuard,
    ) -> Result<Arc<dyn Request>, ConfigError> {
        self.validate()?;
        debug!(model = ?self.model, "Compiling request tree");
        let mut thumb_ancestors = Vec::new();
        self.build_recursive(
            &target,
            None,
            self.transition,
            self.options.effective_priority(),
            self.valid_override(),
            guard,
            &mut thumb_ancestors,
        )
    }

    /// Rejects misconfiguration for the whole chain before any node is
    /// allocated, so a failed compile produces no partial tree.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.is_none() {
            return Err(ConfigError::ModelNotSet);
        }
        if let Some(multiplier) = self.thumbnail_multiplier {
            if !(multiplier > 0.0 && multiplier <= 1.0) {
                return Err(ConfigError::InvalidSizeMultiplier(multiplier));
            }
        }
        if let Some(thumbnail) = &self.thumbnail {
            thumbnail.validate()?;
        }
        if let Some(error) = &self.error {
            error.validate()?;
        }
        Ok(())
    }

    fn valid_override(&self) -> Option<SizeOverride> {
        self.options.size_override.filter(SizeOverride::is_valid)
    }

    /// Top of the per-node recursion: wraps the thumbnail-aware subtree in
    /// an [`ErrorCoordinator`] when an error chain is configured.
    #[allow(clippy::too_many_arguments)]
    fn build_recursive(
        &self,
        target: &Arc<dyn Target>,
        parent: Option<Weak<dyn RequestCoordinator>>,
        transition: Transition,
        priority: Priority,
        size_override: Option<SizeOverride>,
        guard: &EpochGuard,
        thumb_ancestors: &mut Vec<u64>,
    ) -> Result<Arc<dyn Request>, ConfigError> {
        let error_builder = match &self.error {
            None => {
                return self.build_thumbnail_recursive(
                    target,
                    parent,
                    transition,
                    priority,
                    size_override,
                    guard,
                    thumb_ancestors,
                )
            }
            Some(error_builder) => error_builder,
        };

        // The error coordinator is allocated first so it can parent the
        // whole primary subtree, not just the leaf.
        let coordinator = ErrorCoordinator::new(parent);
        let as_parent = Some(Arc::downgrade(&coordinator) as Weak<dyn RequestCoordinator>);

        let primary = self.build_thumbnail_recursive(
            target,
            as_parent.clone(),
            transition,
            priority,
            size_override,
            guard,
            thumb_ancestors,
        )?;

        // The error chain keeps its own transition and priority but
        // inherits this node's override dimensions when it lacks its own.
        let error_request = error_builder.build_recursive(
            target,
            as_parent,
            error_builder.transition,
            error_builder.options.effective_priority(),
            error_builder.valid_override().or(size_override),
            guard,
            thumb_ancestors,
        )?;

        coordinator.wire(primary, error_request);
        Ok(coordinator)
    }

    /// Builds this node's thumbnail race (or the bare request when none is
    /// configured).
    #[allow(clippy::too_many_arguments)]
    fn build_thumbnail_recursive(
        &self,
        target: &Arc<dyn Target>,
        parent: Option<Weak<dyn RequestCoordinator>>,
        transition: Transition,
        priority: Priority,
        size_override: Option<SizeOverride>,
        guard: &EpochGuard,
        thumb_ancestors: &mut Vec<u64>,
    ) -> Result<Arc<dyn Request>, ConfigError> {
        if let Some(thumb_builder) = &self.thumbnail {
            if thumb_builder.id == self.id || thumb_ancestors.contains(&thumb_builder.id) {
                return Err(ConfigError::SelfReferentialThumbnail);
            }

            let coordinator = ThumbnailCoordinator::new(parent);
            let as_parent = Some(Arc::downgrade(&coordinator) as Weak<dyn RequestCoordinator>);

            let full =
                self.obtain_request(target, as_parent.clone(), transition, priority, size_override, guard)?;

            let thumb_transition = if thumb_builder.transition_set {
                thumb_builder.transition
            } else {
                transition
            };
            let thumb_priority = if thumb_builder.options.is_priority_set() {
                thumb_builder.options.effective_priority()
            } else {
                priority.bumped()
            };
            let thumb_override = thumb_builder.valid_override().or(size_override);

            thumb_ancestors.push(self.id);
            let thumb = thumb_builder.build_recursive(
                target,
                as_parent,
                thumb_transition,
                thumb_priority,
                thumb_override,
                guard,
                thumb_ancestors,
            );
            thumb_ancestors.pop();

            coordinator.wire(full, thumb?);
            Ok(coordinator)
        } else if let Some(multiplier) = self.thumbnail_multiplier {
            let coordinator = ThumbnailCoordinator::new(parent);
            let as_parent = Some(Arc::downgrade(&coordinator) as Weak<dyn RequestCoordinator>);

            let full =
                self.obtain_request(target, as_parent.clone(), transition, priority, size_override, guard)?;
            let thumb = self.obtain_scaled_request(
                target,
                as_parent,
                transition,
                priority.bumped(),
                size_override,
                multiplier,
                guard,
            )?;

            coordinator.wire(full, thumb);
            Ok(coordinator)
        } else {
            let request =
                self.obtain_request(target, parent, transition, priority, size_override, guard)?;
            Ok(request)
        }
    }

    fn obtain_request(
        &self,
        target: &Arc<dyn Target>,
        coordinator: Option<Weak<dyn RequestCoordinator>>,
        transition: Transition,
        priority: Priority,
        size_override: Option<SizeOverride>,
        guard: &EpochGuard,
    ) -> Result<Arc<dyn Request>, ConfigError> {
        let model = self.model.clone().ok_or(ConfigError::ModelNotSet)?;
        let spec = LoadSpec {
            model,
            options: self.options.clone(),
            priority,
            size_override,
            transition,
        };
        Ok(SingleRequest::new(
            spec,
            target.clone(),
            self.listeners.clone(),
            coordinator,
            self.engine.clone(),
            guard.clone(),
        ))
    }

    /// The multiplier-thumbnail leaf: same chain, scaled dimensions.
    #[allow(clippy::too_many_arguments)]
    fn obtain_scaled_request(
        &self,
        target: &Arc<dyn Target>,
        coordinator: Option<Weak<dyn RequestCoordinator>>,
        transition: Transition,
        priority: Priority,
        size_override: Option<SizeOverride>,
        multiplier: f32,
        guard: &EpochGuard,
    ) -> Result<Arc<dyn Request>, ConfigError> {
        let model = self.model.clone().ok_or(ConfigError::ModelNotSet)?;
        let spec = LoadSpec {
            model,
            options: self.options.with_size_multiplier(multiplier),
            priority,
            size_override,
            transition,
        };
        Ok(SingleRequest::new(
            spec,
            target.clone(),
            self.listeners.clone(),
            coordinator,
            self.engine.clone(),
            guard.clone(),
        ))
    }
}
