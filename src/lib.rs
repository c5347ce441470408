pub use blockpatch_common as common;
pub use blockpatch_logger as logger;
pub use blockpatch_lookup as lookup;
pub use blockpatch_protocol as protocol;
pub use blockpatch_translator as translator;

// Re-export commonly used items
pub use blockpatch_common::{BlockPos, ChunkPos, ItemStack, PatchError, Result, ViewerId};
pub use blockpatch_lookup::{ConversionLookup, LookupConfig, SegmentLookup};
pub use blockpatch_protocol::{RawChunkFields, SectionFormat, WireEra};
pub use blockpatch_translator::{
    ChunkConversionHook, ChunkTranslator, ConversionCache, ItemConversionHook, OutboundPacket, PatchPipeline,
    TranslateOutcome, WorldQuery,
};
