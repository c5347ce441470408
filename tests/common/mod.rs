use blockpatch::protocol::chunk_data::LegacyChunkLayout;
use blockpatch::protocol::palette::Palette;
use blockpatch::protocol::{PacketBuffer, PackedBlockArray, Section, SECTION_VOLUME};
use blockpatch::{
    ChunkConversionHook, ChunkPos, ChunkTranslator, ConversionCache, ConversionLookup, SectionFormat,
    SegmentLookup, ViewerId, WorldQuery,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// World double: every chunk is loaded unless marked otherwise.
#[derive(Default)]
pub struct FakeWorld {
    unloaded: RwLock<HashSet<ChunkPos>>,
    positions: RwLock<HashMap<ViewerId, ChunkPos>>,
}

impl FakeWorld {
    pub fn unload(&self, pos: ChunkPos) {
        self.unloaded.write().unwrap().insert(pos);
    }

    pub fn move_viewer(&self, viewer: ViewerId, pos: ChunkPos) {
        self.positions.write().unwrap().insert(viewer, pos);
    }
}

impl WorldQuery for FakeWorld {
    fn is_chunk_loaded(&self, _: ViewerId, pos: ChunkPos) -> bool {
        !self.unloaded.read().unwrap().contains(&pos)
    }

    fn viewer_chunk(&self, viewer: ViewerId) -> Option<ChunkPos> {
        self.positions.read().unwrap().get(&viewer).copied()
    }
}

pub fn block_mapping(pairs: &[(u32, u32)]) -> SegmentLookup {
    let mut builder = ConversionLookup::builder();
    for &(from, to) in pairs {
        builder.map_block(from, to).unwrap();
    }
    SegmentLookup::with_base(Arc::new(builder.build()))
}

/// Hook handing `custom` to one viewer and the default to everybody else.
pub fn hook_for(viewer: ViewerId, custom: SegmentLookup) -> Arc<dyn ChunkConversionHook> {
    let custom = Arc::new(custom);
    Arc::new(move |default: &Arc<SegmentLookup>, asking: ViewerId, _: ChunkPos| {
        if asking == viewer {
            Arc::clone(&custom)
        } else {
            Arc::clone(default)
        }
    })
}

pub fn translator(
    default: SegmentLookup,
    hook: Arc<dyn ChunkConversionHook>,
    world: Arc<FakeWorld>,
) -> ChunkTranslator {
    ChunkTranslator::new(Arc::new(ConversionCache::new(default)), hook, world)
}

/// Legacy payload with `bitmask` sections whose id bytes are all `block_id`
/// and whose other bytes count upwards.
pub fn legacy_payload(bitmask: u16, has_skylight: bool, block_id: u8) -> Vec<u8> {
    let layout = LegacyChunkLayout::new(bitmask, 0, has_skylight, true);
    let mut payload: Vec<u8> = (0..layout.size()).map(|i| (i % 251) as u8).collect();
    payload[..layout.block_bytes()].fill(block_id);
    payload
}

/// Four-bit section with palette `[0, 1, 2]` (as `id << 4`) and every entry
/// pointing at slot 1.
pub fn palette_section(has_skylight: bool) -> Section {
    let palette = Palette::from_entries(vec![0, 1 << 4, 2 << 4]).unwrap();
    let mut blocks = PackedBlockArray::new(4).unwrap();
    for index in 0..SECTION_VOLUME {
        blocks.set(index, 1).unwrap();
    }
    let sky_light = has_skylight.then(|| vec![0xFF; 2048]);
    Section::from_parts(blocks, palette, vec![0x11; 2048], sky_light).unwrap()
}

/// `sections` copies of [`palette_section`] followed by 256 biome bytes.
pub fn paletted_payload(sections: usize, has_skylight: bool, format: &SectionFormat) -> Vec<u8> {
    let mut buffer = PacketBuffer::new();
    for _ in 0..sections {
        palette_section(has_skylight).encode(&mut buffer, format);
    }
    buffer.write_bytes_raw(&[1u8; 256]);
    buffer.into_inner()
}
