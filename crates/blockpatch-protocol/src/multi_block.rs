use blockpatch_common::{PatchError, Result};
use byteorder::{BigEndian, ByteOrder};

/// Size of one record in a multi-block change payload.
pub const RECORD_SIZE: usize = 4;

/// One packed multi-block change record.
///
/// Layout (big-endian `u32`): `x << 28 | z << 24 | y << 16 | block_id << 4 | data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChangeRecord {
    pub x: u8,
    pub z: u8,
    pub y: u8,
    /// 12-bit block id.
    pub block_id: u16,
    /// 4-bit block data.
    pub data: u8,
}

impl BlockChangeRecord {
    pub fn decode(bytes: [u8; RECORD_SIZE]) -> Self {
        let raw = BigEndian::read_u32(&bytes);
        Self {
            x: ((raw >> 28) & 0xF) as u8,
            z: ((raw >> 24) & 0xF) as u8,
            y: ((raw >> 16) & 0xFF) as u8,
            block_id: ((raw >> 4) & 0xFFF) as u16,
            data: (raw & 0xF) as u8,
        }
    }

    /// Fields wider than their slot are masked.
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let raw = (self.x as u32 & 0xF) << 28
            | (self.z as u32 & 0xF) << 24
            | (self.y as u32) << 16
            | (self.block_id as u32 & 0xFFF) << 4
            | (self.data as u32 & 0xF);
        let mut bytes = [0u8; RECORD_SIZE];
        BigEndian::write_u32(&mut bytes, raw);
        bytes
    }

    /// Vertical section the record falls in.
    pub fn section(&self) -> usize {
        (self.y >> 4) as usize
    }

    /// Combined `block_id << 4 | data` id.
    pub fn protocol_id(&self) -> u32 {
        (self.block_id as u32) << 4 | self.data as u32
    }
}

fn check_whole(buffer: &[u8]) -> Result<usize> {
    let partial = buffer.len() % RECORD_SIZE;
    if partial != 0 {
        return Err(PatchError::truncated(RECORD_SIZE, partial));
    }
    Ok(buffer.len() / RECORD_SIZE)
}

pub fn decode_records(buffer: &[u8]) -> Result<Vec<BlockChangeRecord>> {
    let count = check_whole(buffer)?;
    let mut records = Vec::with_capacity(count);
    for chunk in buffer.chunks_exact(RECORD_SIZE) {
        records.push(BlockChangeRecord::decode([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(records)
}

pub fn encode_records(records: &[BlockChangeRecord]) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(records.len() * RECORD_SIZE);
    for record in records {
        buffer.extend_from_slice(&record.encode());
    }
    buffer
}

/// Rewrites every record of `buffer` in place through `f` and returns how
/// many records changed. A buffer ending in a partial record is rejected
/// before anything is written.
pub fn remap_records<F>(buffer: &mut [u8], mut f: F) -> Result<usize>
where
    F: FnMut(&BlockChangeRecord) -> BlockChangeRecord,
{
    check_whole(buffer)?;
    let mut changed = 0;
    for chunk in buffer.chunks_exact_mut(RECORD_SIZE) {
        let record = BlockChangeRecord::decode([chunk[0], chunk[1], chunk[2], chunk[3]]);
        let patched = f(&record);
        if patched != record {
            chunk.copy_from_slice(&patched.encode());
            changed += 1;
        }
    }
    Ok(changed)
}
