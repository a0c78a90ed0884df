//! Scene-facing data model
//!
//! Types produced by the external scene/query system and consumed read-only
//! by the pipeline: cameras, lights, bounds, and the per-frame render-queue
//! snapshot interface. The pipeline never mutates scene-owned data.

pub mod aabb;
pub mod camera;
pub mod light;
pub mod query;

pub use aabb::Aabb;
pub use camera::{Camera, Frustum, RenderCamera};
pub use light::{Light, LightKind, ShadowConfig, ShadowFilter};
pub use query::{RenderItem, SceneQuery};
