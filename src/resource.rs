//! The decoded resource delivered to targets.

use bytes::Bytes;

/// Where a delivered resource came from.
///
/// Provenance is surfaced to listeners so callers can, for example, skip
/// transitions for memory-cache hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    /// Served from the in-memory cache.
    MemoryCache,
    /// Served from the on-disk cache.
    DiskCache,
    /// Decoded from locally available data.
    Local,
    /// Fetched from a remote source.
    Remote,
}

/// A decoded image resource produced by the engine.
///
/// The payload is reference-counted so a resource can be delivered to a
/// target and retained by its request for re-delivery without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Decoded pixel data.
    pub data: Bytes,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Where this resource came from.
    pub source: DataSource,
}

impl Resource {
    /// Creates a new resource.
    pub fn new(data: Bytes, width: u32, height: u32, source: DataSource) -> Self {
        Self {
            data,
            width,
            height,
            source,
        }
    }

    /// Returns the payload size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns a copy of this resource tagged as a memory-cache hit.
    ///
    /// Used when a completed request re-delivers its held resource on
    /// restart.
    pub fn as_memory_cache_hit(&self) -> Self {
        Self {
            source: DataSource::MemoryCache,
            ..self.clone()
        }
    }
}
