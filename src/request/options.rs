//! Per-request configuration: priority, sizing, caching and transitions.
//!
//! [`LoadOptions`] is the mutable option snapshot a builder accumulates;
//! the compiler freezes it (plus the effective priority, override and
//! transition resolved by the inheritance rules) into a
//! [`crate::request::LoadSpec`].

/// Priority level for request scheduling.
///
/// Priorities order fetches inside the engine and drive the thumbnail bump
/// rule: a thumbnail runs one step above its parent unless explicitly
/// pinned, so fast feedback is preferred without starving the full request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Background work such as prefetching.
    Low,
    /// Standard requests.
    #[default]
    Normal,
    /// Requests for content in immediate view.
    High,
    /// Must-run-now requests; never exceeded.
    Immediate,
}

impl Priority {
    /// Returns the priority a thumbnail inherits from a parent at `self`.
    ///
    /// `Low → Normal`, `Normal → High`, `High → Immediate`,
    /// `Immediate → Immediate`.
    pub fn bumped(self) -> Self {
        match self {
            Priority::Low => Priority::Normal,
            Priority::Normal => Priority::High,
            Priority::High | Priority::Immediate => Priority::Immediate,
        }
    }
}

/// Explicit dimensions requested instead of measuring the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeOverride {
    /// Load at the source's natural size.
    Original,
    /// Load at explicit pixel dimensions.
    Pixels {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
}

impl SizeOverride {
    /// Returns true if this override can actually be used for a load:
    /// both dimensions positive, or the natural-size sentinel.
    pub fn is_valid(&self) -> bool {
        match self {
            SizeOverride::Original => true,
            SizeOverride::Pixels { width, height } => *width > 0 && *height > 0,
        }
    }
}

/// How the decoded image is fitted to the target.
///
/// Transformations are part of the engine cache key; the actual pixel work
/// belongs to the external codec layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transformation {
    /// Scale to fill, cropping overflow.
    CenterCrop,
    /// Scale to fit entirely within the target.
    FitCenter,
    /// Like `FitCenter` but never upscales.
    CenterInside,
}

/// Caching directives forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    /// Skip the in-memory cache for both reads and writes.
    pub skip_memory_cache: bool,
    /// Skip the on-disk cache for both reads and writes.
    pub skip_disk_cache: bool,
}

/// How a newly delivered resource replaces what the target shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Swap immediately.
    None,
    /// Cross-fade over the given duration.
    CrossFade {
        /// Fade duration in milliseconds.
        duration_ms: u32,
    },
}

impl Default for Transition {
    fn default() -> Self {
        Transition::None
    }
}

/// The option snapshot a builder accumulates.
///
/// `priority` is `None` until explicitly set so the compiler can distinguish
/// "pinned by the caller" from "inherit via the bump rule".
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Explicit priority, if the caller pinned one.
    pub priority: Option<Priority>,
    /// Explicit dimensions, if the caller set any.
    pub size_override: Option<SizeOverride>,
    /// Multiplier applied to the measured or overridden dimensions.
    pub size_multiplier: f32,
    /// Fit transformation, part of the cache key.
    pub transformation: Option<Transformation>,
    /// Cache directives for the engine.
    pub cache: CachePolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            priority: None,
            size_override: None,
            size_multiplier: 1.0,
            transformation: None,
            cache: CachePolicy::default(),
        }
    }
}

impl LoadOptions {
    /// Returns the priority to use when no bump rule applies.
    #[inline]
    pub fn effective_priority(&self) -> Priority {
        self.priority.unwrap_or_default()
    }

    /// Returns true if the caller pinned a priority explicitly.
    #[inline]
    pub fn is_priority_set(&self) -> bool {
        self.priority.is_some()
    }

    /// Returns true if this option set carries a usable override.
    pub fn has_valid_override(&self) -> bool {
        self.size_override.map_or(false, |o| o.is_valid())
    }

    /// Returns a copy with the given size multiplier.
    pub fn with_size_multiplier(&self, multiplier: f32) -> Self {
        Self {
            size_multiplier: multiplier,
            ..self.clone()
        }
    }
}
