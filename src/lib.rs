pub mod config;
pub mod mapping;
pub mod values;

pub use mapping::MappingTable;
pub use values::{MappingLookup, SegmentKey, SegmentRecord};
