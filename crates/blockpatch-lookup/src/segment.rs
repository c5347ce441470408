use crate::conversion::ConversionLookup;
use blockpatch_common::{PatchError, Result};
use std::sync::Arc;

/// Number of vertical segments (chunk sections) in a column.
pub const SEGMENTS: usize = 16;

/// A conversion table per vertical segment of a chunk column.
///
/// Segments without an override read through to the base table.
#[derive(Debug, Clone)]
pub struct SegmentLookup {
    base: Arc<ConversionLookup>,
    overrides: [Option<Arc<ConversionLookup>>; SEGMENTS],
}

impl SegmentLookup {
    /// Every segment maps ids to themselves.
    pub fn identity() -> Self {
        Self::with_base(ConversionLookup::identity())
    }

    pub fn with_base(base: Arc<ConversionLookup>) -> Self {
        Self {
            base,
            overrides: Default::default(),
        }
    }

    /// Replaces the table used for `segment`.
    pub fn with_override(mut self, segment: usize, lookup: Arc<ConversionLookup>) -> Result<Self> {
        self.set_override(segment, lookup)?;
        Ok(self)
    }

    pub fn set_override(&mut self, segment: usize, lookup: Arc<ConversionLookup>) -> Result<()> {
        PatchError::range_check(segment, SEGMENTS)?;
        self.overrides[segment] = Some(lookup);
        Ok(())
    }

    pub fn base(&self) -> &Arc<ConversionLookup> {
        &self.base
    }

    /// Table for `segment`. Segments past the top of the column use the base.
    pub fn segment_view(&self, segment: usize) -> &Arc<ConversionLookup> {
        match self.overrides.get(segment) {
            Some(Some(lookup)) => lookup,
            _ => &self.base,
        }
    }

    fn view_at(&self, block_y: i32) -> &Arc<ConversionLookup> {
        if block_y < 0 {
            return &self.base;
        }
        self.segment_view((block_y >> 4) as usize)
    }

    pub fn lookup_block_at(&self, block_id: u32, block_y: i32) -> u32 {
        self.view_at(block_y).lookup_block(block_id)
    }

    pub fn lookup_data_at(&self, block_id: u32, data: u32, block_y: i32) -> u32 {
        self.view_at(block_y).lookup_data(block_id, data)
    }

    pub fn is_identity(&self) -> bool {
        (0..SEGMENTS).all(|segment| self.segment_view(segment).is_identity())
    }
}

impl Default for SegmentLookup {
    fn default() -> Self {
        Self::identity()
    }
}

/// Two lookups are equal when all sixteen views are.
impl PartialEq for SegmentLookup {
    fn eq(&self, other: &Self) -> bool {
        (0..SEGMENTS).all(|segment| {
            let (a, b) = (self.segment_view(segment), other.segment_view(segment));
            Arc::ptr_eq(a, b) || a == b
        })
    }
}

impl Eq for SegmentLookup {}
