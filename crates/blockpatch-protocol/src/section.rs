use crate::packed_array::{PackedBlockArray, SECTION_VOLUME};
use crate::packet::{PacketBuffer, PacketReader};
use crate::palette::Palette;
use blockpatch_common::{PatchError, Result};

/// Size of one nibble array (block light, sky light, metadata).
pub const LIGHT_DATA: usize = 2048;

/// How a direct-mode section announces its (absent) palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectPalette {
    /// No palette field at all.
    Omitted,
    /// A palette length of zero and no entries.
    EmptyPrefix,
}

/// Layout parameters of one paletted wire-format era.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionFormat {
    pub direct_palette: DirectPalette,
    /// Widest indexed encoding; anything wider is direct.
    pub max_indexed_bits: u8,
    /// Width used when a section has to be switched to direct mode.
    pub direct_bits: u8,
}

impl SectionFormat {
    /// Palette omitted entirely in direct mode.
    pub const COMPACT: SectionFormat = SectionFormat {
        direct_palette: DirectPalette::Omitted,
        max_indexed_bits: 8,
        direct_bits: 13,
    };

    /// 1.9 - 1.12: the palette length is always written, zero in direct mode.
    pub const V1_9: SectionFormat = SectionFormat {
        direct_palette: DirectPalette::EmptyPrefix,
        max_indexed_bits: 8,
        direct_bits: 13,
    };

    pub fn is_direct(&self, bits_per_entry: u8) -> bool {
        bits_per_entry > self.max_indexed_bits
    }
}

impl Default for SectionFormat {
    fn default() -> Self {
        SectionFormat::COMPACT
    }
}

/// One 16x16x16 chunk section as carried in a chunk data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    blocks: PackedBlockArray,
    palette: Palette,
    block_light: Vec<u8>,
    sky_light: Option<Vec<u8>>,
}

impl Section {
    /// All-zero section. Indexed widths start with a palette holding block 0.
    pub fn new(bits_per_entry: u8, has_skylight: bool, format: &SectionFormat) -> Result<Self> {
        let mut palette = if format.is_direct(bits_per_entry) {
            Palette::Direct
        } else {
            Palette::indirect()
        };
        palette.resolve(0);
        Ok(Self {
            blocks: PackedBlockArray::new(bits_per_entry)?,
            palette,
            block_light: vec![0; LIGHT_DATA],
            sky_light: has_skylight.then(|| vec![0; LIGHT_DATA]),
        })
    }

    /// Assembles a section from already decoded parts.
    pub fn from_parts(
        blocks: PackedBlockArray,
        palette: Palette,
        block_light: Vec<u8>,
        sky_light: Option<Vec<u8>>,
    ) -> Result<Self> {
        if block_light.len() != LIGHT_DATA || sky_light.as_ref().is_some_and(|s| s.len() != LIGHT_DATA) {
            return Err(PatchError::unsupported("light arrays must be 2048 bytes"));
        }
        if !palette.fits(blocks.bits_per_entry()) {
            return Err(PatchError::unsupported(format!(
                "{} palette entries do not fit {} bits",
                palette.len(),
                blocks.bits_per_entry()
            )));
        }
        Ok(Self {
            blocks,
            palette,
            block_light,
            sky_light,
        })
    }

    /// Reads one section: bits per entry, palette, packed words, block light
    /// and (when the dimension has sky) sky light.
    pub fn decode(reader: &mut PacketReader, has_skylight: bool, format: &SectionFormat) -> Result<Self> {
        let bits_per_entry = reader.read_u8()?;
        if bits_per_entry == 0 || bits_per_entry > PackedBlockArray::MAX_BITS {
            return Err(PatchError::unsupported(format!(
                "bits per entry {}",
                bits_per_entry
            )));
        }

        let palette = if format.is_direct(bits_per_entry) {
            if format.direct_palette == DirectPalette::EmptyPrefix {
                let palette_length = reader.read_length()?;
                if palette_length != 0 {
                    return Err(PatchError::unsupported(format!(
                        "direct section with {} palette entries",
                        palette_length
                    )));
                }
            }
            Palette::Direct
        } else {
            let palette_length = reader.read_length()?;
            if palette_length as u64 > (1u64 << bits_per_entry) {
                return Err(PatchError::unsupported(format!(
                    "{} palette entries for {} bits per entry",
                    palette_length, bits_per_entry
                )));
            }
            let mut entries = Vec::with_capacity(palette_length);
            for _ in 0..palette_length {
                let id = reader.read_varint()?;
                if id < 0 {
                    return Err(PatchError::unsupported(format!("negative block id {}", id)));
                }
                entries.push(id as u32);
            }
            Palette::from_entries(entries)?
        };

        let data_array_length = reader.read_length()?;
        let expected = PackedBlockArray::words_for(bits_per_entry);
        if data_array_length != expected {
            return Err(PatchError::unsupported(format!(
                "{} data words for {} bits per entry, expected {}",
                data_array_length, bits_per_entry, expected
            )));
        }
        if reader.remaining() < data_array_length * 8 {
            return Err(PatchError::truncated(data_array_length * 8, reader.remaining()));
        }
        let mut data_array = Vec::with_capacity(data_array_length);
        for _ in 0..data_array_length {
            data_array.push(reader.read_u64()?);
        }

        let block_light = reader.read_bytes(LIGHT_DATA)?.to_vec();
        let sky_light = if has_skylight {
            Some(reader.read_bytes(LIGHT_DATA)?.to_vec())
        } else {
            None
        };

        Ok(Self {
            blocks: PackedBlockArray::from_words(bits_per_entry, data_array)?,
            palette,
            block_light,
            sky_light,
        })
    }

    /// Writes the mirror image of [`decode`](Self::decode). Only populated
    /// palette slots are written.
    pub fn encode(&self, buffer: &mut PacketBuffer, format: &SectionFormat) {
        buffer.write_u8(self.blocks.bits_per_entry());

        match &self.palette {
            Palette::Direct => {
                if format.direct_palette == DirectPalette::EmptyPrefix {
                    buffer.write_varint(0);
                }
            }
            Palette::Indirect { entries, .. } => {
                buffer.write_varint(entries.len() as i32);
                for &entry in entries {
                    buffer.write_varint(entry as i32);
                }
            }
        }

        let words = self.blocks.words();
        buffer.write_varint(words.len() as i32);
        for &word in words {
            buffer.write_u64(word);
        }

        buffer.write_bytes_raw(&self.block_light);
        if let Some(sky_light) = &self.sky_light {
            buffer.write_bytes_raw(sky_light);
        }
    }

    pub fn bits_per_entry(&self) -> u8 {
        self.blocks.bits_per_entry()
    }

    pub fn get_palette(&self) -> &Palette {
        &self.palette
    }

    pub fn blocks(&self) -> &PackedBlockArray {
        &self.blocks
    }

    pub fn block_light(&self) -> &[u8] {
        &self.block_light
    }

    pub fn sky_light(&self) -> Option<&[u8]> {
        self.sky_light.as_deref()
    }

    /// Global block id at `index`.
    pub fn get_block(&self, index: usize) -> Result<u32> {
        let local = self.blocks.get(index)?;
        self.palette.block_id_of(local)
    }

    /// Stores a global block id, widening the array (or switching to direct
    /// mode) when the palette outgrows the current width.
    pub fn set_block(&mut self, index: usize, block_id: u32, format: &SectionFormat) -> Result<()> {
        PatchError::range_check(index, SECTION_VOLUME)?;
        let local = self.palette.resolve(block_id);
        if !self.palette.fits(self.blocks.bits_per_entry()) {
            self.grow(format)?;
            return self.set_block(index, block_id, format);
        }
        if self.palette.is_direct() && local > self.blocks.max_value() {
            return Err(PatchError::unsupported(format!(
                "block id {} does not fit in {} bits",
                block_id,
                self.blocks.bits_per_entry()
            )));
        }
        self.blocks.set(index, local)
    }

    fn grow(&mut self, format: &SectionFormat) -> Result<()> {
        let bits = self.blocks.bits_per_entry();
        if bits < format.max_indexed_bits {
            self.blocks = self.blocks.resized(bits + 1)?;
            return Ok(());
        }

        let mut direct = PackedBlockArray::new(format.direct_bits.max(bits))?;
        for index in 0..SECTION_VOLUME {
            let local = self.blocks.get(index)?;
            direct.set(index, self.palette.block_id_of(local)?)?;
        }
        self.blocks = direct;
        self.palette = Palette::Direct;
        Ok(())
    }

    /// Applies `f` to the global id of every block.
    ///
    /// Indexed sections are rewritten through their palette slots: a fresh
    /// palette is built from the mapped ids and every entry is re-pointed in
    /// a single pass. The width never has to grow, since mapping can only
    /// merge slots. On error the section may be partially rewritten.
    pub fn remap_blocks<F: FnMut(u32) -> u32>(&mut self, mut f: F) -> Result<()> {
        match &self.palette {
            Palette::Direct => {
                self.blocks.try_remap(|id| Ok(f(id)))?;
            }
            Palette::Indirect { entries, .. } => {
                let mut palette = Palette::indirect();
                let table: Vec<u32> = entries.iter().map(|&id| palette.resolve(f(id))).collect();
                self.blocks.try_remap(|local| {
                    table
                        .get(local as usize)
                        .copied()
                        .ok_or(PatchError::NotFound(local))
                })?;
                self.palette = palette;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packed_array::block_index;
    use assert_matches::assert_matches;

    fn encoded(section: &Section, format: &SectionFormat) -> Vec<u8> {
        let mut buffer = PacketBuffer::new();
        section.encode(&mut buffer, format);
        buffer.into_inner()
    }

    fn sample_section(has_skylight: bool) -> Section {
        let format = SectionFormat::COMPACT;
        let mut section = Section::new(4, has_skylight, &format).unwrap();
        for index in 0..SECTION_VOLUME {
            section.set_block(index, ((index % 5) as u32) << 4, &format).unwrap();
        }
        section.block_light[7] = 0xAB;
        if let Some(sky) = section.sky_light.as_mut() {
            sky[2047] = 0xF0;
        }
        section
    }

    #[test]
    fn test_round_trip() {
        for has_skylight in [true, false] {
            for format in [SectionFormat::COMPACT, SectionFormat::V1_9] {
                let section = sample_section(has_skylight);
                let bytes = encoded(&section, &format);
                let mut reader = PacketReader::new(&bytes);
                let decoded = Section::decode(&mut reader, has_skylight, &format).unwrap();
                assert_eq!(reader.remaining(), 0);
                assert_eq!(decoded, section);
                for index in 0..SECTION_VOLUME {
                    assert_eq!(decoded.get_block(index).unwrap(), section.get_block(index).unwrap());
                }
                assert_eq!(encoded(&decoded, &format), bytes);
            }
        }
    }

    #[test]
    fn test_wire_layout() {
        let format = SectionFormat::COMPACT;
        let section = Section::new(4, false, &format).unwrap();
        let bytes = encoded(&section, &format);
        // bits, palette length, palette [0], word count (256 as VarInt)
        assert_eq!(&bytes[..5], &[4, 1, 0, 0x80, 0x02]);
        assert_eq!(bytes.len(), 5 + 256 * 8 + LIGHT_DATA);
    }

    #[test]
    fn test_direct_palette_layouts() {
        let section = Section::new(13, true, &SectionFormat::COMPACT).unwrap();
        let compact = encoded(&section, &SectionFormat::COMPACT);
        let legacy = encoded(&section, &SectionFormat::V1_9);
        // COMPACT: bits, word count (832 = 0xC0 0x06)
        assert_eq!(&compact[..3], &[13, 0xC0, 0x06]);
        // V1_9: bits, empty palette, word count
        assert_eq!(&legacy[..4], &[13, 0, 0xC0, 0x06]);
        assert_eq!(legacy.len(), compact.len() + 1);

        let mut reader = PacketReader::new(&legacy);
        let decoded = Section::decode(&mut reader, true, &SectionFormat::V1_9).unwrap();
        assert!(decoded.get_palette().is_direct());
    }

    #[test]
    fn test_free_slots_not_serialized() {
        let format = SectionFormat::COMPACT;
        let mut section = Section::new(4, false, &format).unwrap();
        section.set_block(0, 16, &format).unwrap();
        assert!(section.get_palette().free_slots() > 0);
        let bytes = encoded(&section, &format);
        assert_eq!(bytes[1], 2);
        assert_eq!(&bytes[2..4], &[0, 16]);
    }

    #[test]
    fn test_truncated_input() {
        let section = sample_section(true);
        let bytes = encoded(&section, &SectionFormat::COMPACT);
        for cut in [0, 1, 3, 100, bytes.len() - LIGHT_DATA - 1, bytes.len() - 1] {
            let mut reader = PacketReader::new(&bytes[..cut]);
            assert_matches!(
                Section::decode(&mut reader, true, &SectionFormat::COMPACT),
                Err(PatchError::TruncatedInput { .. }),
                "cut at {}",
                cut
            );
        }
    }

    #[test]
    fn test_skylight_flag_controls_length() {
        let section = sample_section(false);
        let bytes = encoded(&section, &SectionFormat::COMPACT);
        let mut reader = PacketReader::new(&bytes);
        assert_matches!(
            Section::decode(&mut reader, true, &SectionFormat::COMPACT),
            Err(PatchError::TruncatedInput { .. })
        );
    }

    #[test]
    fn test_unsupported_headers() {
        let mut reader = PacketReader::new(&[0, 0]);
        assert_matches!(
            Section::decode(&mut reader, false, &SectionFormat::COMPACT),
            Err(PatchError::UnsupportedFormat(_))
        );

        // Four bits, one palette entry, wrong word count.
        let mut buffer = PacketBuffer::new();
        buffer.write_u8(4);
        buffer.write_varint(1);
        buffer.write_varint(0);
        buffer.write_varint(255);
        let mut reader = PacketReader::new(&buffer.buffer);
        assert_matches!(
            Section::decode(&mut reader, false, &SectionFormat::COMPACT),
            Err(PatchError::UnsupportedFormat(_))
        );

        // Direct section announcing palette entries.
        let mut buffer = PacketBuffer::new();
        buffer.write_u8(13);
        buffer.write_varint(2);
        let mut reader = PacketReader::new(&buffer.buffer);
        assert_matches!(
            Section::decode(&mut reader, false, &SectionFormat::V1_9),
            Err(PatchError::UnsupportedFormat(_))
        );
    }

    #[test]
    fn test_palette_overflow_widens() {
        let format = SectionFormat::COMPACT;
        let mut section = Section::new(4, false, &format).unwrap();
        for id in 0..17u32 {
            section.set_block(id as usize, id << 4, &format).unwrap();
        }
        assert_eq!(section.bits_per_entry(), 5);
        for id in 0..17u32 {
            assert_eq!(section.get_block(id as usize).unwrap(), id << 4);
        }
        assert_eq!(section.get_block(4095).unwrap(), 0);
    }

    #[test]
    fn test_palette_overflow_switches_to_direct() {
        let format = SectionFormat::V1_9;
        let mut section = Section::new(8, false, &format).unwrap();
        for id in 0..257u32 {
            section.set_block(id as usize, id, &format).unwrap();
        }
        assert!(section.get_palette().is_direct());
        assert_eq!(section.bits_per_entry(), 13);
        for id in 0..257u32 {
            assert_eq!(section.get_block(id as usize).unwrap(), id);
        }

        let bytes = encoded(&section, &format);
        let mut reader = PacketReader::new(&bytes);
        let decoded = Section::decode(&mut reader, false, &format).unwrap();
        assert_eq!(decoded.get_block(256).unwrap(), 256);
    }

    #[test]
    fn test_direct_rejects_wide_ids() {
        let format = SectionFormat::COMPACT;
        let mut section = Section::new(13, false, &format).unwrap();
        assert_matches!(
            section.set_block(0, 1 << 13, &format),
            Err(PatchError::UnsupportedFormat(_))
        );
        assert_matches!(
            section.remap_blocks(|_| 1 << 13),
            Err(PatchError::UnsupportedFormat(_))
        );
    }

    #[test]
    fn test_remap_blocks_indexed() {
        let format = SectionFormat::COMPACT;
        let mut section = Section::new(4, false, &format).unwrap();
        section.set_block(block_index(1, 2, 3), 16, &format).unwrap();
        section.set_block(block_index(4, 5, 6), 32, &format).unwrap();

        // 16 -> 32 merges two slots; 0 -> 48 replaces air.
        section
            .remap_blocks(|id| match id {
                0 => 48,
                16 => 32,
                other => other,
            })
            .unwrap();

        assert_eq!(section.get_palette().entries(), &[48, 32]);
        assert_eq!(section.get_block(block_index(1, 2, 3)).unwrap(), 32);
        assert_eq!(section.get_block(block_index(4, 5, 6)).unwrap(), 32);
        assert_eq!(section.get_block(0).unwrap(), 48);
        assert_eq!(section.bits_per_entry(), 4);
    }

    #[test]
    fn test_remap_blocks_dangling_slot() {
        let palette = Palette::from_entries(vec![0]).unwrap();
        let mut blocks = PackedBlockArray::new(4).unwrap();
        blocks.set(10, 3).unwrap();
        let mut section = Section::from_parts(blocks, palette, vec![0; LIGHT_DATA], None).unwrap();
        assert_matches!(section.remap_blocks(|id| id), Err(PatchError::NotFound(3)));
    }

    #[test]
    fn test_from_parts_validation() {
        let blocks = PackedBlockArray::new(4).unwrap();
        assert_matches!(
            Section::from_parts(blocks.clone(), Palette::Direct, vec![0; 10], None),
            Err(PatchError::UnsupportedFormat(_))
        );
        let palette = Palette::from_entries((0..17).collect()).unwrap();
        assert_matches!(
            Section::from_parts(blocks, palette, vec![0; LIGHT_DATA], None),
            Err(PatchError::UnsupportedFormat(_))
        );
    }
}
