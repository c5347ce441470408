use crate::hook::{ChunkConversionHook, WorldQuery};
use blockpatch_common::{ChunkPos, ViewerId};
use blockpatch_lookup::{ConversionLookup, SegmentLookup};
use dashmap::DashMap;
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;

/// Replaceable process-wide default table. Readers get a cheap `Arc` clone.
#[derive(Debug)]
pub struct DefaultLookup {
    current: RwLock<Arc<SegmentLookup>>,
}

impl DefaultLookup {
    pub fn new(lookup: SegmentLookup) -> Self {
        Self {
            current: RwLock::new(Arc::new(lookup)),
        }
    }

    pub fn get(&self) -> Arc<SegmentLookup> {
        self.current.read().clone()
    }

    /// Installs `lookup` and returns the previous table.
    pub fn replace(&self, lookup: SegmentLookup) -> Arc<SegmentLookup> {
        self.replace_with(lookup, || ())
    }

    /// Installs `lookup` and runs `then` while still holding the write lock.
    fn replace_with(&self, lookup: SegmentLookup, then: impl FnOnce()) -> Arc<SegmentLookup> {
        let mut current = self.current.write();
        let previous = std::mem::replace(&mut *current, Arc::new(lookup));
        then();
        previous
    }

    /// Runs `f` only if `expected` is still the installed table. The table
    /// cannot be replaced while `f` runs.
    fn with_unchanged<R>(&self, expected: &Arc<SegmentLookup>, f: impl FnOnce() -> R) -> Option<R> {
        let current = self.current.read();
        Arc::ptr_eq(expected, &*current).then(f)
    }
}

impl Default for DefaultLookup {
    fn default() -> Self {
        Self::new(SegmentLookup::identity())
    }
}

#[derive(Debug, Clone)]
enum CachedConversion {
    /// The hook answered with something other than the default.
    Custom(Arc<SegmentLookup>),
    /// Observed, and the default applies.
    Absent,
}

/// Per viewer and chunk conversion tables computed by the policy hook.
#[derive(Debug, Default)]
pub struct ConversionCache {
    entries: DashMap<(ViewerId, ChunkPos), CachedConversion>,
    default: DefaultLookup,
}

impl ConversionCache {
    pub fn new(default: SegmentLookup) -> Self {
        Self {
            entries: DashMap::new(),
            default: DefaultLookup::new(default),
        }
    }

    pub fn default_lookup(&self) -> Arc<SegmentLookup> {
        self.default.get()
    }

    /// Swaps the default table. Every cached entry was derived from the old
    /// default, so the cache is emptied.
    pub fn set_default_lookup(&self, lookup: SegmentLookup) {
        let mut dropped = 0;
        self.default.replace_with(lookup, || {
            dropped = self.entries.len();
            self.entries.clear();
        });
        info!("Default lookup replaced, dropped {} cached conversions", dropped);
    }

    /// Cached table for the chunk, or the default. Never calls the hook.
    pub fn lookup_or_default(&self, viewer: ViewerId, pos: ChunkPos) -> Arc<SegmentLookup> {
        if let Some(entry) = self.entries.get(&(viewer, pos)) {
            if let CachedConversion::Custom(lookup) = entry.value() {
                return Arc::clone(lookup);
            }
        }
        self.default.get()
    }

    /// Single section view of [`lookup_or_default`](Self::lookup_or_default).
    pub fn lookup_section_or_default(
        &self,
        viewer: ViewerId,
        chunk_x: i32,
        section_y: i32,
        chunk_z: i32,
    ) -> Arc<ConversionLookup> {
        let lookup = self.lookup_or_default(viewer, ChunkPos::new(chunk_x, chunk_z));
        if section_y < 0 {
            return Arc::clone(lookup.base());
        }
        Arc::clone(lookup.segment_view(section_y as usize))
    }

    /// Whether the chunk has been observed for this viewer.
    pub fn contains(&self, viewer: ViewerId, pos: ChunkPos) -> bool {
        self.entries.contains_key(&(viewer, pos))
    }

    /// Records the table for a chunk. A table equal to `default` is stored as
    /// "use the default".
    pub fn store(&self, viewer: ViewerId, pos: ChunkPos, lookup: Arc<SegmentLookup>, default: &SegmentLookup) {
        let entry = if *lookup == *default {
            CachedConversion::Absent
        } else {
            CachedConversion::Custom(lookup)
        };
        self.entries.insert((viewer, pos), entry);
    }

    /// Runs the hook for a chunk and caches the answer. No lock is held
    /// while the hook runs.
    ///
    /// When the default changes while the hook runs, the answer is returned
    /// but not cached.
    pub fn compute_and_store(
        &self,
        viewer: ViewerId,
        pos: ChunkPos,
        hook: &dyn ChunkConversionHook,
    ) -> Arc<SegmentLookup> {
        let default = self.default.get();
        let lookup = hook.chunk_conversion(&default, viewer, pos);

        let stored = self
            .default
            .with_unchanged(&default, || self.store(viewer, pos, Arc::clone(&lookup), &default));
        if stored.is_none() {
            debug!("Default lookup changed while computing {} for {}", pos, viewer);
        }
        lookup
    }

    pub fn invalidate(&self, viewer: ViewerId, pos: ChunkPos) -> bool {
        self.entries.remove(&(viewer, pos)).is_some()
    }

    /// Drops every entry of a viewer and returns how many were removed.
    pub fn invalidate_viewer(&self, viewer: ViewerId) -> usize {
        let mut removed = 0;
        self.entries.retain(|(owner, _), _| {
            let keep = *owner != viewer;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Drops entries whose chunk is no longer loaded. The world is queried
    /// without holding any shard lock.
    pub fn retain_loaded(&self, world: &dyn WorldQuery) -> usize {
        let keys: Vec<(ViewerId, ChunkPos)> = self.entries.iter().map(|entry| *entry.key()).collect();
        let mut removed = 0;
        for (viewer, pos) in keys {
            if !world.is_chunk_loaded(viewer, pos) && self.entries.remove(&(viewer, pos)).is_some() {
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
