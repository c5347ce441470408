use crate::cache::ConversionCache;
use crate::hook::{ChunkConversionHook, ItemConversionHook, PassThrough, WorldQuery};
use blockpatch_common::{BlockPos, ChunkPos, ItemStack, PatchError, Result, ViewerId};
use blockpatch_lookup::SegmentLookup;
use blockpatch_protocol::chunk_data::{
    present_sections, BulkChunkEntry, LegacyChunkLayout, PalettedChunkData, RawChunkFields, WireEra,
};
use blockpatch_protocol::compression;
use blockpatch_protocol::multi_block::{self, BlockChangeRecord};
use blockpatch_protocol::section::SectionFormat;
use log::{debug, warn};
use std::sync::Arc;

/// Object type id of a falling block entity spawn.
pub const FALLING_BLOCK_OBJECT: i32 = 70;

#[derive(Debug)]
pub enum UnchangedReason {
    /// The world does not have the chunk loaded.
    ChunkNotLoaded,
    /// The payload could not be decoded; it was passed through as is.
    Malformed(PatchError),
}

/// Result of translating one chunk. The payload is only touched on
/// [`Translated`](TranslateOutcome::Translated).
#[derive(Debug)]
pub enum TranslateOutcome {
    Translated,
    Unchanged(UnchangedReason),
}

impl TranslateOutcome {
    pub fn is_translated(&self) -> bool {
        matches!(self, TranslateOutcome::Translated)
    }

    fn malformed(error: PatchError) -> Self {
        TranslateOutcome::Unchanged(UnchangedReason::Malformed(error))
    }
}

/// Rewrites block ids in outbound world data for one viewer at a time.
pub struct ChunkTranslator {
    cache: Arc<ConversionCache>,
    hook: Arc<dyn ChunkConversionHook>,
    items: Arc<dyn ItemConversionHook>,
    world: Arc<dyn WorldQuery>,
}

impl ChunkTranslator {
    pub fn new(
        cache: Arc<ConversionCache>,
        hook: Arc<dyn ChunkConversionHook>,
        world: Arc<dyn WorldQuery>,
    ) -> Self {
        Self {
            cache,
            hook,
            items: Arc::new(PassThrough),
            world,
        }
    }

    /// Installs the policy for dropped items. Items pass through without one.
    pub fn with_item_hook(mut self, items: Arc<dyn ItemConversionHook>) -> Self {
        self.items = items;
        self
    }

    pub fn cache(&self) -> &Arc<ConversionCache> {
        &self.cache
    }

    pub fn world(&self) -> &Arc<dyn WorldQuery> {
        &self.world
    }

    /// Translates a full chunk with the cached (or default) table, then asks
    /// the hook for the table later packets of this chunk should use.
    pub fn translate_full_chunk(&self, viewer: ViewerId, fields: &mut RawChunkFields) -> TranslateOutcome {
        let outcome = self.translate_full_chunk_cached(viewer, fields);
        if !matches!(outcome, TranslateOutcome::Unchanged(UnchangedReason::ChunkNotLoaded)) {
            self.observe_chunk(viewer, fields.pos);
        }
        outcome
    }

    /// Translates a full chunk without consulting the hook.
    pub fn translate_full_chunk_cached(&self, viewer: ViewerId, fields: &mut RawChunkFields) -> TranslateOutcome {
        if !self.world.is_chunk_loaded(viewer, fields.pos) {
            debug!("Skipping chunk {} for {}: not loaded", fields.pos, viewer);
            return TranslateOutcome::Unchanged(UnchangedReason::ChunkNotLoaded);
        }

        let lookup = self.cache.lookup_or_default(viewer, fields.pos);
        match Self::patch_payload(&lookup, fields) {
            Ok(payload) => {
                fields.payload = payload;
                TranslateOutcome::Translated
            }
            Err(e) => {
                warn!("Passing chunk {} to {} unchanged: {}", fields.pos, viewer, e);
                TranslateOutcome::malformed(e)
            }
        }
    }

    fn patch_payload(lookup: &SegmentLookup, fields: &RawChunkFields) -> Result<Vec<u8>> {
        let mut plain = compression::unpack(&fields.payload, fields.compression)?;
        match fields.era {
            WireEra::Legacy => {
                let layout = LegacyChunkLayout::from_fields(fields);
                layout.check_bounds(0, plain.len())?;
                remap_legacy(lookup, &layout, fields.bitmask, &mut plain, 0);
            }
            WireEra::Paletted(format) => {
                plain = remap_paletted(lookup, fields, &plain, &format)?;
            }
        }
        compression::pack(plain, fields.compression)
    }

    /// Runs the hook for a chunk and caches its answer.
    pub fn observe_chunk(&self, viewer: ViewerId, pos: ChunkPos) -> Arc<SegmentLookup> {
        self.cache.compute_and_store(viewer, pos, self.hook.as_ref())
    }

    /// Translates every chunk of a legacy bulk packet in place and runs the
    /// hook for the loaded ones. Chunks follow each other in `payload`.
    pub fn translate_chunk_bulk(
        &self,
        viewer: ViewerId,
        has_skylight: bool,
        entries: &[BulkChunkEntry],
        payload: &mut [u8],
    ) -> Vec<TranslateOutcome> {
        let outcomes = self.translate_chunk_bulk_cached(viewer, has_skylight, entries, payload);
        for (entry, outcome) in entries.iter().zip(&outcomes) {
            if !matches!(outcome, TranslateOutcome::Unchanged(UnchangedReason::ChunkNotLoaded)) {
                self.observe_chunk(viewer, entry.pos);
            }
        }
        outcomes
    }

    pub fn translate_chunk_bulk_cached(
        &self,
        viewer: ViewerId,
        has_skylight: bool,
        entries: &[BulkChunkEntry],
        payload: &mut [u8],
    ) -> Vec<TranslateOutcome> {
        let mut start = 0;
        let mut outcomes = Vec::with_capacity(entries.len());

        for entry in entries {
            let layout = entry.layout(has_skylight);
            let outcome = if !self.world.is_chunk_loaded(viewer, entry.pos) {
                debug!("Skipping bulk chunk {} for {}: not loaded", entry.pos, viewer);
                TranslateOutcome::Unchanged(UnchangedReason::ChunkNotLoaded)
            } else if let Err(e) = layout.check_bounds(start, payload.len()) {
                warn!("Bulk chunk {} for {} overruns the buffer: {}", entry.pos, viewer, e);
                TranslateOutcome::malformed(e)
            } else {
                let lookup = self.cache.lookup_or_default(viewer, entry.pos);
                remap_legacy(&lookup, &layout, entry.bitmask, payload, start);
                TranslateOutcome::Translated
            };
            outcomes.push(outcome);
            start += layout.size();
        }
        outcomes
    }

    /// Remaps a single block change. Returns the new `(block_id, data)`.
    pub fn translate_single_block(&self, viewer: ViewerId, pos: BlockPos, block_id: u32, data: u32) -> (u32, u32) {
        let chunk = pos.chunk();
        let view = self
            .cache
            .lookup_section_or_default(viewer, chunk.x, pos.section_y(), chunk.z);
        (view.lookup_block(block_id), view.lookup_data(block_id, data))
    }

    /// Remaps packed multi-block change records in place. A buffer ending in
    /// a partial record is left untouched.
    pub fn translate_multi_block_records(&self, viewer: ViewerId, pos: ChunkPos, records: &mut [u8]) -> Result<usize> {
        let lookup = self.cache.lookup_or_default(viewer, pos);
        multi_block::remap_records(records, |record| {
            let view = lookup.segment_view(record.section());
            let block_id = record.block_id as u32;
            BlockChangeRecord {
                data: view.lookup_data(block_id, record.data as u32) as u8,
                block_id: view.lookup_block(block_id) as u16,
                ..*record
            }
        })
    }

    /// Remaps the block id carried in a falling block spawn. Other object
    /// types are returned unchanged.
    pub fn translate_falling_block(&self, viewer: ViewerId, object_type: i32, pos: BlockPos, data: i32) -> i32 {
        if object_type != FALLING_BLOCK_OBJECT || data < 0 {
            return data;
        }
        let chunk = pos.chunk();
        let view = self
            .cache
            .lookup_section_or_default(viewer, chunk.x, pos.section_y(), chunk.z);
        view.lookup_block(data as u32) as i32
    }

    /// Runs the item hook on a dropped item stack. Returns whether the stack
    /// changed.
    pub fn translate_dropped_item(&self, viewer: ViewerId, item: &mut ItemStack) -> bool {
        let mut converted = [*item];
        self.items.convert_items(&mut converted, viewer);
        if converted[0] == *item {
            return false;
        }
        debug!("Dropped item {:?} shown to {} as {:?}", item, viewer, converted[0]);
        *item = converted[0];
        true
    }

    /// Whether the viewer stands in `pos`.
    pub fn is_viewer_chunk(&self, viewer: ViewerId, pos: ChunkPos) -> bool {
        self.world.viewer_chunk(viewer) == Some(pos)
    }

    pub fn invalidate(&self, viewer: ViewerId, pos: ChunkPos) -> bool {
        self.cache.invalidate(viewer, pos)
    }

    pub fn invalidate_viewer(&self, viewer: ViewerId) -> usize {
        self.cache.invalidate_viewer(viewer)
    }

    pub fn set_default_lookup(&self, lookup: SegmentLookup) {
        self.cache.set_default_lookup(lookup);
    }
}

/// Maps every block id byte of the present sections. Metadata nibbles are
/// left as sent, as are ids whose mapping does not fit in a byte.
fn remap_legacy(lookup: &SegmentLookup, layout: &LegacyChunkLayout, bitmask: u16, payload: &mut [u8], start: usize) {
    let mut too_wide = 0usize;
    for (ordinal, section_y) in present_sections(bitmask).enumerate() {
        let view = lookup.segment_view(section_y);
        for id in &mut payload[layout.block_range(start, ordinal)] {
            match u8::try_from(view.lookup_block(*id as u32)) {
                Ok(mapped) => *id = mapped,
                Err(_) => too_wide += 1,
            }
        }
    }
    if too_wide > 0 {
        warn!("Kept {} legacy block ids whose mapping is wider than a byte", too_wide);
    }
}

fn remap_paletted(
    lookup: &SegmentLookup,
    fields: &RawChunkFields,
    payload: &[u8],
    format: &SectionFormat,
) -> Result<Vec<u8>> {
    let mut chunk = PalettedChunkData::decode(payload, fields.bitmask, fields.has_skylight, format)?;
    for (section_y, section) in chunk.sections_mut() {
        let view = lookup.segment_view(section_y);
        section.remap_blocks(|raw| view.lookup_protocol_id(raw))?;
    }
    Ok(chunk.encode(format))
}
