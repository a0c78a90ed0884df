//! Render Path
//!
//! Owns every shared GPU resource of the pipeline and drives the per-frame
//! stage sequence for the configured path. One instance per output surface;
//! the device, queue and scene access are injected at construction.
//!
//! A frame is three phases:
//!
//! 1. snapshot + plan: capture the scene, derive cascades, packed lights and
//!    tile dimensions by pure math;
//! 2. ensure: resize the shadow arena, light buffer and tile buffers to what
//!    the plan needs;
//! 3. execute: `prepare` then `run` each stage's node in order, one command
//!    encoder, one submit.

use log::{debug, trace};

use crate::error::{LumenError, Result};
use crate::scene::camera::Camera;
use crate::scene::query::SceneQuery;
use crate::settings::{PipelineSettings, Stage};

use super::context::{FrameContext, FrameGlobals};
use super::frame::{FramePlan, FrameSnapshot};
use super::lights::LightBuffers;
use super::node::RenderNode;
use super::passes::{GBufferPass, LightAccumulationPass, ShadingCompositePass, ToneMapPass};
use super::shadow::pass::ShadowPass;
use super::shadow::storage::{ShadowLayout, ShadowMapStorage};
use super::targets::{RenderTargets, TargetLayout};
use super::tile::math::TileGrid;
use super::tile::pass::{TileBuffers, TileLightCullPass};

const INITIAL_LIGHT_CAPACITY: u32 = 64;

pub struct RenderPath {
    device: wgpu::Device,
    queue: wgpu::Queue,
    settings: PipelineSettings,

    globals: FrameGlobals,
    targets: Option<RenderTargets>,
    shadows: ShadowMapStorage,
    lights: LightBuffers,
    tiles: TileBuffers,

    shadow_pass: ShadowPass,
    gbuffer_pass: Option<GBufferPass>,
    tile_cull_pass: Option<TileLightCullPass>,
    accum_pass: LightAccumulationPass,
    composite_pass: ShadingCompositePass,
    tone_map_pass: ToneMapPass,
}

impl RenderPath {
    /// Builds the pipeline for `settings`. Fails on invalid settings; GPU
    /// resources that depend on the output size wait for [`Self::resize`].
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        settings: PipelineSettings,
    ) -> Result<Self> {
        settings.validate()?;
        debug!(
            "creating render path: {:?}, tile_size={}, max_lights={}",
            settings.path, settings.tile_size, settings.max_lights
        );

        let globals = FrameGlobals::new(device);
        let shadows = ShadowMapStorage::new(
            device,
            ShadowLayout {
                map_size: crate::scene::light::ShadowConfig::default().map_size,
                layer_count: 1,
                filter: crate::scene::light::ShadowFilter::default(),
            },
        );
        let lights = LightBuffers::new(device, INITIAL_LIGHT_CAPACITY);
        let tiles = TileBuffers::new(
            device,
            TileGrid::new(settings.tile_size, settings.tile_size, settings.tile_size),
            settings.max_lights_per_tile,
        );

        let stages = settings.path.stages();
        let shadow_pass = ShadowPass::new(device);
        let gbuffer_pass = stages
            .contains(&Stage::GBuffer)
            .then(|| GBufferPass::new(device, globals.layout(), &settings));
        let tile_cull_pass = stages
            .contains(&Stage::LightCull)
            .then(|| TileLightCullPass::new(device, globals.layout()));
        let accum_pass = LightAccumulationPass::new(device, globals.layout(), &settings);
        let composite_pass = ShadingCompositePass::new(device, &settings);
        let tone_map_pass = ToneMapPass::new(device, &settings);

        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            settings,
            globals,
            targets: None,
            shadows,
            lights,
            tiles,
            shadow_pass,
            gbuffer_pass,
            tile_cull_pass,
            accum_pass,
            composite_pass,
            tone_map_pass,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Exposure for the tone-map stage. Takes effect next frame.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.settings.exposure = exposure.max(0.0);
        self.tone_map_pass.set_exposure(self.settings.exposure);
    }

    /// Background color (linear) for pixels with no geometry.
    pub fn set_background(&mut self, color: [f32; 4]) {
        self.composite_pass.set_background(color);
    }

    /// (Re)builds the screen-sized targets. Idempotent for an unchanged
    /// extent; must be called once before the first [`Self::render_scene`].
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        let layout = TargetLayout::new(&self.settings, width, height)?;
        match &mut self.targets {
            Some(targets) => {
                if targets.ensure(&self.device, layout) {
                    debug!("render targets rebuilt: {width}x{height}");
                }
            }
            None => {
                self.targets = Some(RenderTargets::new(&self.device, layout));
                debug!("render targets created: {width}x{height}");
            }
        }
        Ok(())
    }

    /// Renders one frame into `output`.
    pub fn render_scene(
        &mut self,
        camera: &Camera,
        scene: &dyn SceneQuery,
        output: &wgpu::TextureView,
    ) -> Result<()> {
        let Some(targets) = &mut self.targets else {
            return Err(LumenError::TargetsNotInitialized);
        };
        let extent = targets.extent();

        let snapshot = FrameSnapshot::capture(scene, camera.render_camera());
        let plan = FramePlan::build(&self.settings, &snapshot, extent);
        trace!(
            "frame plan: {} items, {} packed lights, {} shadow layers",
            snapshot.items.len(),
            plan.lights_gpu.len(),
            plan.shadow_layer_count
        );

        self.globals
            .upload(&self.queue, &snapshot, extent, self.settings.exposure);
        self.lights.upload(
            &self.device,
            &self.queue,
            &plan.lights_gpu,
            &plan.spot_shadows_gpu,
        );
        self.shadows.ensure(
            &self.device,
            ShadowLayout {
                map_size: plan.shadow_map_size,
                layer_count: plan.shadow_layer_count,
                filter: plan.shadow_filter,
            },
        );
        if let Some(tile) = &plan.tile {
            self.tiles
                .ensure(&self.device, tile.grid, tile.max_lights_per_tile);
        }

        let ctx = FrameContext {
            device: &self.device,
            queue: &self.queue,
            settings: &self.settings,
            snapshot: &snapshot,
            plan: &plan,
            targets,
            shadows: &self.shadows,
            lights: &self.lights,
            tiles: &self.tiles,
            globals: &self.globals,
            output,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lumen Frame"),
            });

        for stage in self.settings.path.stages() {
            let node: &mut dyn RenderNode = match stage {
                Stage::Shadow => &mut self.shadow_pass,
                Stage::GBuffer => match &mut self.gbuffer_pass {
                    Some(pass) => pass,
                    None => continue,
                },
                Stage::LightCull => match &mut self.tile_cull_pass {
                    Some(pass) => pass,
                    None => continue,
                },
                Stage::LightAccumulate => &mut self.accum_pass,
                Stage::Composite => &mut self.composite_pass,
                Stage::ToneMap => &mut self.tone_map_pass,
            };
            node.prepare(&ctx);
            encoder.push_debug_group(node.name());
            node.run(&ctx, &mut encoder);
            encoder.pop_debug_group();
        }

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}
