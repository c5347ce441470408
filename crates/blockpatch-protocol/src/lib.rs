pub mod chunk_data;
pub mod compression;
pub mod multi_block;
pub mod packed_array;
pub mod packet;
pub mod palette;
pub mod section;

pub use chunk_data::{
    present_sections, BulkChunkEntry, LegacyChunkLayout, PalettedChunkData, PayloadCompression,
    RawChunkFields, WireEra,
};
pub use multi_block::BlockChangeRecord;
pub use packed_array::{block_index, PackedBlockArray, SECTION_VOLUME};
pub use packet::{PacketBuffer, PacketReader};
pub use palette::Palette;
pub use section::{Section, SectionFormat};
