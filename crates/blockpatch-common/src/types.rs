use std::fmt;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, crate::error::PatchError>;

/// Identity of a connected client whose view of the world may be patched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub Uuid);

impl ViewerId {
    /// Offline-mode style identity derived from the player name (name-based
    /// UUID, version 3).
    pub fn offline(name: &str) -> Self {
        ViewerId(Uuid::new_v3(
            &Uuid::NAMESPACE_OID,
            format!("OfflinePlayer:{}", name).as_bytes(),
        ))
    }
}

impl From<Uuid> for ViewerId {
    fn from(uuid: Uuid) -> Self {
        ViewerId(uuid)
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Column coordinate of a chunk (block coordinate >> 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given block coordinates.
    pub const fn from_block(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x >> 4,
            z: block_z >> 4,
        }
    }

    /// Chunk containing the given world position.
    pub fn from_position(x: f64, z: f64) -> Self {
        Self::from_block(x.floor() as i32, z.floor() as i32)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Absolute block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos::from_block(self.x, self.z)
    }

    /// Vertical section index, `y >> 4`.
    pub const fn section_y(&self) -> i32 {
        self.y >> 4
    }
}

/// Item stack carried by a dropped item entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemStack {
    pub item_id: i32,
    pub count: i32,
    pub damage: i16,
}

impl ItemStack {
    pub const fn new(item_id: i32, count: i32, damage: i16) -> Self {
        Self { item_id, count, damage }
    }
}
