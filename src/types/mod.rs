//! Type definitions

pub mod geo;
pub mod hotspot;
pub mod messages;
pub mod segment;
pub mod settings;
pub mod timeline;

pub use geo::*;
pub use hotspot::*;
pub use messages::*;
pub use segment::*;
pub use settings::*;
pub use timeline::*;
