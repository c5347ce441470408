use crate::packed_array::SECTION_VOLUME;
use crate::packet::{PacketBuffer, PacketReader};
use crate::section::{Section, SectionFormat, LIGHT_DATA};
use blockpatch_common::{ChunkPos, PatchError, Result};
use std::ops::Range;

/// Vertical sections in one chunk column.
pub const CHUNK_SECTIONS: usize = 16;
/// Biome bytes appended to a continuous (full column) payload.
pub const BIOME_ARRAY_LENGTH: usize = 256;
/// Nibble arrays every legacy section carries: block ids (two), metadata and
/// block light.
const LEGACY_NIBBLE_ARRAYS: usize = 4;

/// Wire-format revision a chunk payload was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEra {
    /// One byte per block id followed by nibble arrays.
    Legacy,
    /// Bit-packed sections with palettes.
    Paletted(SectionFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadCompression {
    #[default]
    None,
    /// The payload is a zlib stream and is re-deflated after patching.
    Zlib,
}

/// A chunk data packet's fields, already pulled out of whatever packet
/// structure the server uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunkFields {
    pub pos: ChunkPos,
    /// Bit `i` set when section `i` is present.
    pub bitmask: u16,
    /// Sections carrying an extra (add) nibble array. Legacy era only.
    pub extra_bitmask: u16,
    /// Whether the biome array follows the sections.
    pub continuous: bool,
    pub has_skylight: bool,
    pub era: WireEra,
    pub compression: PayloadCompression,
    pub payload: Vec<u8>,
}

impl RawChunkFields {
    /// Uncompressed, continuous fields with no extra sections.
    pub fn new(pos: ChunkPos, bitmask: u16, has_skylight: bool, era: WireEra, payload: Vec<u8>) -> Self {
        Self {
            pos,
            bitmask,
            extra_bitmask: 0,
            continuous: true,
            has_skylight,
            era,
            compression: PayloadCompression::None,
            payload,
        }
    }
}

/// Indices of the sections present in `mask`, lowest first.
pub fn present_sections(mask: u16) -> impl Iterator<Item = usize> {
    (0..CHUNK_SECTIONS).filter(move |i| mask & (1 << i) != 0)
}

/// Offsets of a legacy-era chunk inside its payload.
///
/// All block id arrays come first (4096 bytes per present section), followed
/// by metadata, block light, sky light and add arrays, then biomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyChunkLayout {
    pub section_count: usize,
    pub extra_count: usize,
    pub has_skylight: bool,
    pub continuous: bool,
}

impl LegacyChunkLayout {
    pub fn new(bitmask: u16, extra_bitmask: u16, has_skylight: bool, continuous: bool) -> Self {
        Self {
            section_count: bitmask.count_ones() as usize,
            extra_count: extra_bitmask.count_ones() as usize,
            has_skylight,
            continuous,
        }
    }

    pub fn from_fields(fields: &RawChunkFields) -> Self {
        Self::new(
            fields.bitmask,
            fields.extra_bitmask,
            fields.has_skylight,
            fields.continuous,
        )
    }

    /// Total bytes this chunk occupies.
    pub fn size(&self) -> usize {
        let sky = usize::from(self.has_skylight);
        LIGHT_DATA * ((LEGACY_NIBBLE_ARRAYS + sky) * self.section_count + self.extra_count)
            + if self.continuous { BIOME_ARRAY_LENGTH } else { 0 }
    }

    /// Bytes taken by the block id arrays.
    pub fn block_bytes(&self) -> usize {
        SECTION_VOLUME * self.section_count
    }

    /// Block id bytes of the `ordinal`-th present section, for a chunk
    /// starting at `start`.
    pub fn block_range(&self, start: usize, ordinal: usize) -> Range<usize> {
        let begin = start + ordinal * SECTION_VOLUME;
        begin..begin + SECTION_VOLUME
    }

    /// Checks that a chunk starting at `start` fits in `available` bytes.
    pub fn check_bounds(&self, start: usize, available: usize) -> Result<()> {
        let needed = start + self.size();
        if needed > available {
            return Err(PatchError::truncated(needed, available));
        }
        Ok(())
    }
}

/// One chunk of a legacy bulk packet. Every chunk in a bulk packet is
/// continuous and shares the packet's sky light flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkChunkEntry {
    pub pos: ChunkPos,
    pub bitmask: u16,
    pub extra_bitmask: u16,
}

impl BulkChunkEntry {
    pub fn layout(&self, has_skylight: bool) -> LegacyChunkLayout {
        LegacyChunkLayout::new(self.bitmask, self.extra_bitmask, has_skylight, true)
    }
}

/// Decoded sections of a paletted chunk payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PalettedChunkData {
    /// `(section y, section)` in ascending order.
    sections: Vec<(usize, Section)>,
    /// Everything after the last section (biomes), copied verbatim.
    trailing: Vec<u8>,
}

impl PalettedChunkData {
    pub fn decode(payload: &[u8], bitmask: u16, has_skylight: bool, format: &SectionFormat) -> Result<Self> {
        let mut reader = PacketReader::new(payload);
        let mut sections = Vec::with_capacity(bitmask.count_ones() as usize);
        for section_y in present_sections(bitmask) {
            let section = Section::decode(&mut reader, has_skylight, format)?;
            sections.push((section_y, section));
        }
        Ok(Self {
            sections,
            trailing: reader.rest().to_vec(),
        })
    }

    pub fn encode(&self, format: &SectionFormat) -> Vec<u8> {
        let mut buffer = PacketBuffer::with_capacity(self.sections.len() * (LIGHT_DATA * 3) + self.trailing.len());
        for (_, section) in &self.sections {
            section.encode(&mut buffer, format);
        }
        buffer.write_bytes_raw(&self.trailing);
        buffer.into_inner()
    }

    pub fn get_section(&self, section_y: usize) -> Option<&Section> {
        self.sections
            .iter()
            .find(|(y, _)| *y == section_y)
            .map(|(_, section)| section)
    }

    pub fn sections_mut(&mut self) -> impl Iterator<Item = (usize, &mut Section)> {
        self.sections.iter_mut().map(|(y, section)| (*y, section))
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_present_sections() {
        assert_eq!(present_sections(0b1000_0000_0000_0101).collect::<Vec<_>>(), vec![0, 2, 15]);
        assert_eq!(present_sections(0).count(), 0);
        assert_eq!(present_sections(u16::MAX).count(), 16);
    }

    #[test]
    fn test_legacy_size() {
        let layout = LegacyChunkLayout::new(0b11, 0, true, true);
        assert_eq!(layout.size(), 2048 * 10 + 256);
        assert_eq!(layout.block_bytes(), 8192);

        let layout = LegacyChunkLayout::new(0b111, 0b1, false, false);
        assert_eq!(layout.size(), 2048 * (4 * 3 + 1));

        assert_eq!(LegacyChunkLayout::new(0, 0, true, true).size(), 256);
    }

    #[test]
    fn test_legacy_block_range() {
        let layout = LegacyChunkLayout::new(0b1010, 0, true, true);
        assert_eq!(layout.block_range(100, 0), 100..4196);
        assert_eq!(layout.block_range(100, 1), 4196..8292);
    }

    #[test]
    fn test_legacy_bounds() {
        let layout = LegacyChunkLayout::new(0b1, 0, true, true);
        assert!(layout.check_bounds(0, layout.size()).is_ok());
        assert_matches!(
            layout.check_bounds(1, layout.size()),
            Err(PatchError::TruncatedInput { .. })
        );
    }

    fn paletted_payload(format: &SectionFormat) -> Vec<u8> {
        let mut first = Section::new(4, true, format).unwrap();
        first.set_block(0, 16, format).unwrap();
        let second = Section::new(5, true, format).unwrap();

        let mut buffer = PacketBuffer::new();
        first.encode(&mut buffer, format);
        second.encode(&mut buffer, format);
        buffer.write_bytes_raw(&[7u8; BIOME_ARRAY_LENGTH]);
        buffer.into_inner()
    }

    #[test]
    fn test_paletted_round_trip() {
        let format = SectionFormat::V1_9;
        let payload = paletted_payload(&format);
        let chunk = PalettedChunkData::decode(&payload, 0b1001, true, &format).unwrap();

        assert_eq!(chunk.section_count(), 2);
        assert_eq!(chunk.get_section(0).unwrap().get_block(0).unwrap(), 16);
        assert_eq!(chunk.get_section(3).unwrap().bits_per_entry(), 5);
        assert!(chunk.get_section(1).is_none());
        assert_eq!(chunk.trailing(), &[7u8; BIOME_ARRAY_LENGTH][..]);
        assert_eq!(chunk.encode(&format), payload);
    }

    #[test]
    fn test_paletted_truncated() {
        let format = SectionFormat::COMPACT;
        let payload = paletted_payload(&format);
        assert_matches!(
            PalettedChunkData::decode(&payload, 0b111, true, &format),
            Err(PatchError::TruncatedInput { .. }) | Err(PatchError::UnsupportedFormat(_))
        );
        assert_matches!(
            PalettedChunkData::decode(&payload[..100], 0b1, true, &format),
            Err(PatchError::TruncatedInput { .. })
        );
    }

    #[test]
    fn test_raw_fields_defaults() {
        let fields = RawChunkFields::new(ChunkPos::new(1, 2), 0b1, true, WireEra::Legacy, Vec::new());
        assert!(fields.continuous);
        assert_eq!(fields.extra_bitmask, 0);
        assert_eq!(fields.compression, PayloadCompression::None);
        assert_eq!(LegacyChunkLayout::from_fields(&fields).size(), 2048 * 5 + 256);
    }
}
