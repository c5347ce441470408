pub mod config;
pub mod conversion;
pub mod segment;

pub use config::LookupConfig;
pub use conversion::{ConversionLookup, ConversionLookupBuilder};
pub use segment::SegmentLookup;
