use blockpatch_common::{PatchError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Block ids are 12 bits wide.
pub const BLOCK_ID_LIMIT: usize = 4096;
/// Data values are 4 bits wide.
pub const DATA_VALUES: usize = 16;

static IDENTITY: Lazy<Arc<ConversionLookup>> = Lazy::new(|| Arc::new(ConversionLookup::new()));

/// Immutable block id and block data substitution table.
///
/// Unmapped ids and data values translate to themselves. Ids outside the
/// 12-bit range always pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionLookup {
    blocks: Box<[u16]>,
    data: HashMap<u16, [u8; DATA_VALUES]>,
}

impl ConversionLookup {
    fn new() -> Self {
        Self {
            blocks: (0..BLOCK_ID_LIMIT as u16).collect(),
            data: HashMap::new(),
        }
    }

    /// Shared identity table.
    pub fn identity() -> Arc<ConversionLookup> {
        Arc::clone(&IDENTITY)
    }

    pub fn builder() -> ConversionLookupBuilder {
        ConversionLookupBuilder::new()
    }

    pub fn is_identity(&self) -> bool {
        self == IDENTITY.as_ref()
    }

    pub fn lookup_block(&self, block_id: u32) -> u32 {
        match self.blocks.get(block_id as usize) {
            Some(&mapped) => mapped as u32,
            None => block_id,
        }
    }

    /// Data translation keyed by the original block id.
    pub fn lookup_data(&self, block_id: u32, data: u32) -> u32 {
        if block_id as usize >= BLOCK_ID_LIMIT || data as usize >= DATA_VALUES {
            return data;
        }
        match self.data.get(&(block_id as u16)) {
            Some(table) => table[data as usize] as u32,
            None => data,
        }
    }

    /// Remaps a combined `block_id << 4 | data` id.
    pub fn lookup_protocol_id(&self, raw: u32) -> u32 {
        let block_id = raw >> 4;
        let data = raw & 0xF;
        let data = self.lookup_data(block_id, data);
        self.lookup_block(block_id) << 4 | data
    }
}

impl Default for ConversionLookup {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects block and data mappings into a [`ConversionLookup`].
#[derive(Debug, Clone)]
pub struct ConversionLookupBuilder {
    lookup: ConversionLookup,
}

impl ConversionLookupBuilder {
    pub fn new() -> Self {
        Self {
            lookup: ConversionLookup::new(),
        }
    }

    /// Starts from an existing table.
    pub fn from_lookup(lookup: &ConversionLookup) -> Self {
        Self {
            lookup: lookup.clone(),
        }
    }

    pub fn map_block(&mut self, from: u32, to: u32) -> Result<&mut Self> {
        PatchError::range_check(from as usize, BLOCK_ID_LIMIT)?;
        PatchError::range_check(to as usize, BLOCK_ID_LIMIT)?;
        self.lookup.blocks[from as usize] = to as u16;
        Ok(self)
    }

    /// Data `from` of block `block_id` becomes `to`.
    pub fn map_data(&mut self, block_id: u32, from: u32, to: u32) -> Result<&mut Self> {
        PatchError::range_check(block_id as usize, BLOCK_ID_LIMIT)?;
        PatchError::range_check(from as usize, DATA_VALUES)?;
        PatchError::range_check(to as usize, DATA_VALUES)?;
        let table = self
            .lookup
            .data
            .entry(block_id as u16)
            .or_insert_with(identity_data);
        table[from as usize] = to as u8;
        Ok(self)
    }

    /// Finishes the table. Data tables that map every value to itself are
    /// dropped, so a table that changes nothing equals the identity.
    pub fn build(mut self) -> ConversionLookup {
        let identity = identity_data();
        self.lookup.data.retain(|_, table| *table != identity);
        self.lookup
    }
}

fn identity_data() -> [u8; DATA_VALUES] {
    let mut table = [0u8; DATA_VALUES];
    for (value, slot) in table.iter_mut().enumerate() {
        *slot = value as u8;
    }
    table
}

impl Default for ConversionLookupBuilder {
    fn default() -> Self {
        Self::new()
    }
}
