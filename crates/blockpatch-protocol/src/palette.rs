use blockpatch_common::{PatchError, Result};

/// Spare slots reserved whenever an indirect palette runs out of room.
pub const PALETTE_GROWTH: usize = 10;

/// Maps the local indices stored in a section to global block ids.
#[derive(Debug, Clone)]
pub enum Palette {
    /// Entries are global block ids; nothing is materialized.
    Direct,
    /// Entries are positions in `entries`.
    Indirect {
        entries: Vec<u32>,
        /// Reserved trailing capacity not yet handed out. Never serialized.
        free_slots: usize,
    },
}

impl Palette {
    pub fn indirect() -> Self {
        Palette::Indirect {
            entries: Vec::with_capacity(PALETTE_GROWTH),
            free_slots: PALETTE_GROWTH,
        }
    }

    /// Builds an indirect palette from wire entries. Duplicate ids are rejected.
    pub fn from_entries(entries: Vec<u32>) -> Result<Self> {
        for (slot, id) in entries.iter().enumerate() {
            if entries[..slot].contains(id) {
                return Err(PatchError::unsupported(format!(
                    "duplicate palette entry {} at slot {}",
                    id, slot
                )));
            }
        }
        let mut entries = entries;
        entries.reserve_exact(PALETTE_GROWTH);
        Ok(Palette::Indirect {
            entries,
            free_slots: PALETTE_GROWTH,
        })
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Palette::Direct)
    }

    /// Local index for `block_id`, appending it when unknown.
    pub fn resolve(&mut self, block_id: u32) -> u32 {
        match self {
            Palette::Direct => block_id,
            Palette::Indirect {
                entries,
                free_slots,
            } => {
                if let Some(slot) = entries.iter().position(|&id| id == block_id) {
                    return slot as u32;
                }
                if *free_slots == 0 {
                    entries.reserve_exact(PALETTE_GROWTH);
                    *free_slots = PALETTE_GROWTH;
                }
                entries.push(block_id);
                *free_slots -= 1;
                (entries.len() - 1) as u32
            }
        }
    }

    /// Global block id stored at `local`.
    pub fn block_id_of(&self, local: u32) -> Result<u32> {
        match self {
            Palette::Direct => Ok(local),
            Palette::Indirect { entries, .. } => entries
                .get(local as usize)
                .copied()
                .ok_or(PatchError::NotFound(local)),
        }
    }

    /// Populated slots only. Zero for a direct palette.
    pub fn len(&self) -> usize {
        match self {
            Palette::Direct => 0,
            Palette::Indirect { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn free_slots(&self) -> usize {
        match self {
            Palette::Direct => 0,
            Palette::Indirect { free_slots, .. } => *free_slots,
        }
    }

    pub fn entries(&self) -> &[u32] {
        match self {
            Palette::Direct => &[],
            Palette::Indirect { entries, .. } => entries,
        }
    }

    /// Whether every populated slot is addressable with `bits` bits.
    pub fn fits(&self, bits: u8) -> bool {
        match self {
            Palette::Direct => true,
            Palette::Indirect { entries, .. } => (entries.len() as u64) <= (1u64 << bits),
        }
    }
}

/// Free slots are padding and do not take part in equality.
impl PartialEq for Palette {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Palette::Direct, Palette::Direct) => true,
            (Palette::Indirect { entries: a, .. }, Palette::Indirect { entries: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for Palette {}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_resolve_appends_and_is_idempotent() {
        let mut palette = Palette::indirect();
        assert_eq!(palette.resolve(16), 0);
        assert_eq!(palette.resolve(32), 1);
        assert_eq!(palette.resolve(16), 0);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.free_slots(), PALETTE_GROWTH - 2);
    }

    #[test]
    fn test_growth_keeps_slots() {
        let mut palette = Palette::from_entries(vec![0, 1, 2]).unwrap();
        let ids: Vec<u32> = (100..100 + 3 * PALETTE_GROWTH as u32).collect();
        let slots: Vec<u32> = ids.iter().map(|&id| palette.resolve(id)).collect();

        assert_eq!(palette.len(), 3 + ids.len());
        assert_eq!(palette.block_id_of(0).unwrap(), 0);
        assert_eq!(palette.block_id_of(2).unwrap(), 2);
        for (id, slot) in ids.iter().zip(&slots) {
            assert_eq!(palette.resolve(*id), *slot);
            assert_eq!(palette.block_id_of(*slot).unwrap(), *id);
        }
        assert!(palette.free_slots() < PALETTE_GROWTH);
    }

    #[test]
    fn test_free_slot_accounting() {
        let mut palette = Palette::indirect();
        for id in 0..PALETTE_GROWTH as u32 {
            palette.resolve(id);
        }
        assert_eq!(palette.free_slots(), 0);
        palette.resolve(999);
        assert_eq!(palette.free_slots(), PALETTE_GROWTH - 1);
    }

    #[test]
    fn test_block_id_of_not_found() {
        let palette = Palette::from_entries(vec![7, 8]).unwrap();
        assert_matches!(palette.block_id_of(2), Err(PatchError::NotFound(2)));
    }

    #[test]
    fn test_direct_is_identity() {
        let mut palette = Palette::Direct;
        assert_eq!(palette.resolve(1234), 1234);
        assert_eq!(palette.block_id_of(4321).unwrap(), 4321);
        assert_eq!(palette.len(), 0);
        assert!(palette.fits(1));
    }

    #[test]
    fn test_duplicates_rejected() {
        assert_matches!(
            Palette::from_entries(vec![1, 2, 1]),
            Err(PatchError::UnsupportedFormat(_))
        );
    }

    #[test]
    fn test_fits() {
        let palette = Palette::from_entries((0..16).collect()).unwrap();
        assert!(palette.fits(4));
        assert!(!palette.fits(3));
    }

    #[test]
    fn test_equality_ignores_free_slots() {
        let mut grown = Palette::indirect();
        grown.resolve(5);
        grown.resolve(6);
        let decoded = Palette::from_entries(vec![5, 6]).unwrap();
        assert_ne!(grown.free_slots(), decoded.free_slots());
        assert_eq!(grown, decoded);
        assert_ne!(grown, Palette::Direct);
    }
}
