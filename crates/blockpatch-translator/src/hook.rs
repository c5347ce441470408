use blockpatch_common::{ChunkPos, ItemStack, ViewerId};
use blockpatch_lookup::SegmentLookup;
use std::sync::Arc;

/// Policy deciding which table a viewer sees for one chunk.
///
/// Called with the current default. Returning the default (or anything equal
/// to it) means "no custom table".
pub trait ChunkConversionHook: Send + Sync {
    fn chunk_conversion(
        &self,
        default: &Arc<SegmentLookup>,
        viewer: ViewerId,
        pos: ChunkPos,
    ) -> Arc<SegmentLookup>;
}

impl<F> ChunkConversionHook for F
where
    F: Fn(&Arc<SegmentLookup>, ViewerId, ChunkPos) -> Arc<SegmentLookup> + Send + Sync,
{
    fn chunk_conversion(
        &self,
        default: &Arc<SegmentLookup>,
        viewer: ViewerId,
        pos: ChunkPos,
    ) -> Arc<SegmentLookup> {
        self(default, viewer, pos)
    }
}

/// Hook that always answers with the default table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ChunkConversionHook for PassThrough {
    fn chunk_conversion(&self, default: &Arc<SegmentLookup>, _: ViewerId, _: ChunkPos) -> Arc<SegmentLookup> {
        Arc::clone(default)
    }
}

/// Policy rewriting the items a viewer sees on dropped item entities.
/// Stacks are edited in place; leaving them alone keeps the packet as sent.
pub trait ItemConversionHook: Send + Sync {
    fn convert_items(&self, items: &mut [ItemStack], viewer: ViewerId);
}

impl<F> ItemConversionHook for F
where
    F: Fn(&mut [ItemStack], ViewerId) + Send + Sync,
{
    fn convert_items(&self, items: &mut [ItemStack], viewer: ViewerId) {
        self(items, viewer)
    }
}

impl ItemConversionHook for PassThrough {
    fn convert_items(&self, _: &mut [ItemStack], _: ViewerId) {}
}

/// What the server knows about its worlds and viewers.
pub trait WorldQuery: Send + Sync {
    /// Whether `pos` is loaded in the world `viewer` is in.
    fn is_chunk_loaded(&self, viewer: ViewerId, pos: ChunkPos) -> bool;

    /// Chunk the viewer currently stands in, if known.
    fn viewer_chunk(&self, viewer: ViewerId) -> Option<ChunkPos>;
}
