//! Database queries

pub mod distance_cache;
pub mod hotspot;
pub mod segment;
pub mod timeline;
