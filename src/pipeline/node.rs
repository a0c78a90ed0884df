//! Render Node Trait
//!
//! Every pass of the pipeline implements [`RenderNode`]. The contract splits
//! each stage into two phases:
//!
//! - `prepare` gets mutable access to the node itself plus the read-only
//!   [`FrameContext`], and performs all allocation: pipeline compilation,
//!   bind-group (re)construction, uniform writes.
//! - `run` is read-only and records GPU commands into the frame's shared
//!   command encoder.
//!
//! The executing [`RenderPath`] wraps every `run` in a debug group named
//! after the node, so GPU captures show one labeled span per stage.
//!
//! [`FrameContext`]: super::context::FrameContext
//! [`RenderPath`]: super::path::RenderPath

use super::context::FrameContext;

pub trait RenderNode {
    /// Node name used for debug groups and resource labels.
    fn name(&self) -> &str;

    /// Allocate/refresh GPU state for this frame. No command recording here.
    fn prepare(&mut self, _ctx: &FrameContext<'_>) {}

    /// Record GPU commands. Must not allocate.
    fn run(&self, ctx: &FrameContext<'_>, encoder: &mut wgpu::CommandEncoder);
}
