//! Cascaded Shadow Maps
//!
//! Split math, cascade bounds, the shadow map arena, and the depth pass.

pub mod cascade;
pub mod pass;
pub mod splits;
pub mod storage;

pub use cascade::{CascadeBound, CascadeSet};
pub use pass::{caster_visible, ShadowPass};
pub use splits::compute_frustum_splits;
pub use storage::{ShadowLayout, ShadowMapStorage};
