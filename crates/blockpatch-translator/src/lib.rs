pub mod cache;
pub mod hook;
pub mod pipeline;
pub mod session;
pub mod session_manager;
pub mod translator;

pub use cache::{ConversionCache, DefaultLookup};
pub use hook::{ChunkConversionHook, ItemConversionHook, PassThrough, WorldQuery};
pub use pipeline::{OutboundPacket, PatchPipeline};
pub use translator::{ChunkTranslator, TranslateOutcome, UnchangedReason};
