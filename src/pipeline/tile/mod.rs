//! Tiled Light Culling
//!
//! Screen-space tile partition, the GPU culling dispatch, and the CPU
//! reference culler used by tests.

pub mod math;
pub mod pass;

pub use math::{CullOutput, TileGrid, TileRange};
pub use pass::{TileBuffers, TileLightCullPass};
