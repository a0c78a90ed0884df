#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod error;
pub mod pipeline;
pub mod scene;
pub mod settings;

pub use error::{LumenError, Result};
pub use pipeline::RenderPath;
pub use scene::camera::{Camera, Frustum, RenderCamera};
pub use scene::light::{Light, LightKind, ShadowConfig, ShadowFilter, MAX_CASCADES};
pub use scene::query::{MaterialBinding, MaterialParams, MeshBuffers, RenderItem, SceneQuery};
pub use scene::Aabb;
pub use settings::{PipelineSettings, RenderPathKind, Stage};
