pub mod error;
pub mod types;

pub use error::PatchError;
pub use types::{BlockPos, ChunkPos, ItemStack, Result, ViewerId};
