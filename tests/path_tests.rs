//! Frame-plan and configuration tests: the device-free half of a frame,
//! from scene snapshot to cascade/tile/light assignments.

use glam::Vec3;

use lumen::pipeline::frame::{FramePlan, FrameSnapshot};
use lumen::pipeline::lights::LightGpu;
use lumen::pipeline::targets::TargetLayout;
use lumen::scene::camera::Camera;
use lumen::settings::Stage;
use lumen::{
    Aabb, Light, LumenError, PipelineSettings, RenderPathKind, ShadowConfig, ShadowFilter,
};

fn scene_camera() -> Camera {
    let mut camera = Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 300.0);
    camera.look_at(Vec3::new(0.0, 10.0, 30.0), Vec3::ZERO, Vec3::Y);
    camera
}

fn snapshot_with_lights(lights: Vec<Light>) -> FrameSnapshot {
    FrameSnapshot {
        camera: scene_camera().render_camera(),
        items: Vec::new(),
        lights,
        scene_bounds: Aabb::from_points(&[Vec3::splat(-60.0), Vec3::splat(60.0)]),
    }
}

fn shadowed_directional(lambda: f32) -> Light {
    let mut light = Light::new_directional(Vec3::ONE, 3.0, Vec3::new(-0.3, -1.0, -0.2));
    light.cast_shadows = true;
    light.shadow = Some(ShadowConfig {
        cascade_count: 4,
        cascade_split_lambda: lambda,
        ..ShadowConfig::default()
    });
    light
}

fn shadowed_spot() -> Light {
    let mut light = Light::new_spot(
        Vec3::ONE,
        5.0,
        Vec3::new(0.0, 8.0, 0.0),
        Vec3::NEG_Y,
        25.0,
        0.3,
        0.5,
    );
    light.cast_shadows = true;
    light.shadow = Some(ShadowConfig::default());
    light
}

#[test]
fn directional_light_gets_four_ascending_cascades() {
    let settings = PipelineSettings::default();
    let snapshot = snapshot_with_lights(vec![shadowed_directional(0.7)]);
    let plan = FramePlan::build(&settings, &snapshot, (1920, 1080));

    let dir = plan.directional.as_ref().expect("directional plan");
    assert_eq!(dir.cascades.len(), 4);
    for (i, cascade) in dir.cascades.iter().enumerate() {
        assert_eq!(cascade.layer, i as u32);
    }
    for pair in dir.cascades.windows(2) {
        assert!(pair[0].bound.split_far < pair[1].bound.split_far);
    }
    for i in 0..4 {
        assert!(dir.splits[i] < dir.splits[i + 1]);
    }

    assert!(plan.has_shadows());
    assert_eq!(plan.shadow_layer_count, 4);
    assert_eq!(plan.shadow_filter, ShadowFilter::Pcf);
}

#[test]
fn spot_shadow_layers_stack_after_the_cascades() {
    let settings = PipelineSettings::default();
    let snapshot = snapshot_with_lights(vec![shadowed_directional(0.5), shadowed_spot()]);
    let plan = FramePlan::build(&settings, &snapshot, (1920, 1080));

    assert_eq!(plan.shadow_layer_count, 5);
    assert_eq!(plan.spot_shadows.len(), 1);
    assert_eq!(plan.spot_shadows[0].layer, 4);
    assert_eq!(plan.spot_shadows[0].light_index, 1);

    // The spot is also a packed local light, wired to its shadow view.
    assert_eq!(plan.lights_gpu.len(), 1);
    assert_eq!(plan.lights_gpu[0].shadow_layer, 4);
    assert_eq!(plan.lights_gpu[0].shadow_slot, 0);
}

#[test]
fn spot_shadow_records_carry_the_view_parameters() {
    let settings = PipelineSettings::default();
    let snapshot = snapshot_with_lights(vec![shadowed_spot()]);
    let plan = FramePlan::build(&settings, &snapshot, (1920, 1080));

    assert_eq!(plan.spot_shadows_gpu.len(), 1);
    let record = &plan.spot_shadows_gpu[0];
    let config = ShadowConfig::default();
    assert_eq!(record.params[0], config.bias);
    assert_eq!(record.params[1], config.normal_bias);
    assert_eq!(record.params[2], plan.shadow_map_size as f32);
    assert_eq!(
        record.view_projection,
        plan.spot_shadows[0].view_projection.to_cols_array_2d()
    );
}

#[test]
fn unshadowed_lights_carry_no_shadow_layer() {
    let settings = PipelineSettings::default();
    let point = Light::new_point(Vec3::ONE, 2.0, Vec3::new(0.0, 5.0, 0.0), 20.0);
    let snapshot = snapshot_with_lights(vec![point]);
    let plan = FramePlan::build(&settings, &snapshot, (1920, 1080));

    assert!(plan.spot_shadows_gpu.is_empty());
    assert_eq!(plan.lights_gpu.len(), 1);
    assert_eq!(plan.lights_gpu[0].shadow_layer, -1);
    assert_eq!(plan.lights_gpu[0].shadow_slot, -1);
}

#[test]
fn tiled_paths_carry_a_tile_plan() {
    let settings = PipelineSettings::default();
    let snapshot = snapshot_with_lights(Vec::new());
    let plan = FramePlan::build(&settings, &snapshot, (1920, 1080));

    let tile = plan.tile.expect("tiled deferred plans tiles");
    assert_eq!(tile.grid.tiles_x, 120);
    assert_eq!(tile.grid.tiles_y, 68);
    assert_eq!(tile.max_lights_per_tile, settings.max_lights_per_tile);
}

#[test]
fn forward_path_skips_tiles_and_gbuffer() {
    let settings = PipelineSettings {
        path: RenderPathKind::Forward,
        ..PipelineSettings::default()
    };
    let snapshot = snapshot_with_lights(Vec::new());
    let plan = FramePlan::build(&settings, &snapshot, (1280, 720));

    assert!(plan.tile.is_none());
    assert!(!settings.path.uses_gbuffer());
    assert!(!settings.path.uses_tile_culling());
}

#[test]
fn forward_plus_gbuffer_stage_is_depth_only() {
    let settings = PipelineSettings {
        path: RenderPathKind::ForwardPlus,
        ..PipelineSettings::default()
    };

    // Forward+ shades in the accumulation pass; the G-buffer stage exists
    // only to fill depth for the tile culler, so the composite must treat
    // the accumulation output as final color.
    assert!(settings.path.stages().contains(&Stage::GBuffer));
    assert!(settings.path.uses_tile_culling());
    assert!(!settings.path.uses_gbuffer());
    assert!(RenderPathKind::Deferred.uses_gbuffer());
    assert!(RenderPathKind::TiledDeferred.uses_gbuffer());

    let layout = TargetLayout::new(&settings, 1280, 720).expect("valid extent");
    assert!(!layout.full_gbuffer);
}

#[test]
fn no_shadow_casters_means_no_shadow_layers() {
    let settings = PipelineSettings::default();
    let mut light = shadowed_directional(0.5);
    light.cast_shadows = false;
    let snapshot = snapshot_with_lights(vec![light]);
    let plan = FramePlan::build(&settings, &snapshot, (1920, 1080));

    assert!(plan.directional.is_none());
    assert!(!plan.has_shadows());
    assert_eq!(plan.shadow_layer_count, 0);
}

#[test]
fn empty_scene_bounds_disable_directional_shadows() {
    let settings = PipelineSettings::default();
    let mut snapshot = snapshot_with_lights(vec![shadowed_directional(0.5)]);
    snapshot.scene_bounds = Aabb::EMPTY;
    let plan = FramePlan::build(&settings, &snapshot, (1920, 1080));

    assert!(plan.directional.is_none());
    assert!(!plan.has_shadows());
}

#[test]
fn directional_config_governs_the_shadow_arena() {
    let settings = PipelineSettings::default();
    let mut dir = shadowed_directional(0.5);
    if let Some(config) = &mut dir.shadow {
        config.map_size = 2048;
        config.filter = ShadowFilter::Vsm;
    }
    let snapshot = snapshot_with_lights(vec![shadowed_spot(), dir]);
    let plan = FramePlan::build(&settings, &snapshot, (1920, 1080));

    assert_eq!(plan.shadow_map_size, 2048);
    assert_eq!(plan.shadow_filter, ShadowFilter::Vsm);
}

#[test]
fn stage_sequences_per_path() {
    assert_eq!(
        RenderPathKind::Forward.stages(),
        &[
            Stage::Shadow,
            Stage::LightAccumulate,
            Stage::Composite,
            Stage::ToneMap
        ][..]
    );
    assert_eq!(RenderPathKind::Deferred.stages().len(), 5);
    assert!(RenderPathKind::Deferred.stages().contains(&Stage::GBuffer));
    assert!(!RenderPathKind::Deferred.stages().contains(&Stage::LightCull));

    for kind in [RenderPathKind::TiledDeferred, RenderPathKind::ForwardPlus] {
        let stages = kind.stages();
        assert_eq!(stages.len(), 6);
        // The cull dispatch must land after the depth-producing pass and
        // before accumulation reads the tile buffers.
        let gbuffer = stages.iter().position(|s| *s == Stage::GBuffer).unwrap();
        let cull = stages.iter().position(|s| *s == Stage::LightCull).unwrap();
        let accum = stages
            .iter()
            .position(|s| *s == Stage::LightAccumulate)
            .unwrap();
        assert!(gbuffer < cull && cull < accum);
    }
}

#[test]
fn light_gpu_record_is_64_bytes() {
    assert_eq!(std::mem::size_of::<LightGpu>(), 64);
}

#[test]
fn settings_validation_rejects_bad_tiles_and_budgets() {
    let bad_tile = PipelineSettings {
        tile_size: 10,
        ..PipelineSettings::default()
    };
    assert!(matches!(
        bad_tile.validate(),
        Err(LumenError::InvalidTileSize(10))
    ));

    let too_big = PipelineSettings {
        tile_size: 128,
        ..PipelineSettings::default()
    };
    assert!(too_big.validate().is_err());

    let bad_budget = PipelineSettings {
        max_lights_per_tile: 300,
        ..PipelineSettings::default()
    };
    assert!(matches!(
        bad_budget.validate(),
        Err(LumenError::InvalidMaxLightsPerTile(300, _))
    ));

    assert!(PipelineSettings::default().validate().is_ok());
}

#[test]
fn shadow_config_validation() {
    let bad_count = ShadowConfig {
        cascade_count: 5,
        ..ShadowConfig::default()
    };
    assert!(matches!(
        bad_count.validate(),
        Err(LumenError::InvalidCascadeCount { count: 5, .. })
    ));

    let bad_size = ShadowConfig {
        map_size: 1000,
        ..ShadowConfig::default()
    };
    assert!(matches!(
        bad_size.validate(),
        Err(LumenError::InvalidShadowMapSize(1000))
    ));

    assert!(ShadowConfig::default().validate().is_ok());
}

#[test]
fn target_layout_rejects_zero_extent() {
    let settings = PipelineSettings::default();
    assert!(matches!(
        TargetLayout::new(&settings, 0, 1080),
        Err(LumenError::InvalidExtent { width: 0, .. })
    ));
    assert!(TargetLayout::new(&settings, 1920, 1080).is_ok());
}
