mod gpu;
mod gpu_buffers;
mod headless;
mod setup;
mod shaders;
mod textures;

use std::{cell::RefCell, rc::Rc};

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::{
    camera::Camera,
    lighting::{LightKind, ShadowAlgorithm, ShadowMap},
    scene_graph::{NodeId, SceneGraph},
};

pub use gpu::GpuRenderer;
pub use headless::HeadlessRenderer;
pub use setup::{apply_options, PowerPreference, Precision, RendererOptions, Viewport};

/// A renderer shared between the scene that draws with it and the light
/// registry that tunes its shadow settings.
pub type SharedRenderer = Rc<RefCell<dyn FrameRenderer>>;

/// Renderer wide shadow map configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowMapSettings {
    pub enabled: bool,
    pub algorithm: ShadowAlgorithm,
    /// Re-render shadow maps every frame. When false maps are only rendered
    /// after `needs_update` is set on the renderer or the light.
    pub auto_update: bool,
    pub needs_update: bool,
}

impl Default for ShadowMapSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            algorithm: ShadowAlgorithm::PcfSoft,
            auto_update: true,
            needs_update: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("the renderer has been disposed")]
    Disposed,
    #[error("the surface could not provide a frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Draws a scene graph from a camera. Implemented by the wgpu renderer and by
/// a headless renderer that only does the CPU side bookkeeping.
pub trait FrameRenderer {
    /// Resize the drawing surface. `width` and `height` are logical pixels.
    fn set_size(&mut self, width: u32, height: u32);

    /// Logical to physical pixel ratio.
    fn set_pixel_ratio(&mut self, ratio: f32);

    fn size(&self) -> (u32, u32);

    fn pixel_ratio(&self) -> f32;

    fn shadow_map(&self) -> &ShadowMapSettings;

    fn shadow_map_mut(&mut self) -> &mut ShadowMapSettings;

    /// Render one frame. Takes the graph mutably because shadow maps are
    /// (re)allocated on the lights that own them.
    fn render(&mut self, graph: &mut SceneGraph, camera: &Camera) -> Result<(), RenderError>;

    /// Release any GPU resources cached for the mesh node `node`.
    fn release_mesh(&mut self, node: NodeId);

    /// Release every resource. Later renders fail with `RenderError::Disposed`.
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;

    fn frames_rendered(&self) -> u64;
}

/// A shadow map that must be rendered this frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ShadowJob {
    pub node: NodeId,
    pub kind: ShadowCasterKind,
    pub resolution: u32,
    pub generation: u64,
    pub view_projection: Mat4,
    pub bias: f32,
    pub normal_bias: f32,
    pub radius: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum ShadowCasterKind {
    Directional,
    Spot,
    Point,
}

/// Allocate missing shadow maps and list the ones that need rendering.
///
/// A map is (re)allocated when the light has none, for example after the light
/// registry dropped it, or when its resolution no longer matches the light's
/// configured map size. Each allocation takes the next value of `generation`.
/// Update flags on the renderer and the lights are cleared.
pub(crate) fn prepare_shadow_maps(
    settings: &mut ShadowMapSettings,
    graph: &mut SceneGraph,
    generation: &mut u64,
) -> Vec<ShadowJob> {
    if !settings.enabled {
        return Vec::new();
    }

    let mut jobs = Vec::new();

    for id in graph.lights() {
        if !graph.is_visible_in_world(id) {
            continue;
        }

        let world_position = graph.world_position(id);
        let target = graph.world_matrix(graph.root()).transform_point3(Vec3::ZERO);

        let Some(light) = graph.get_mut(id).and_then(|n| n.light_mut()) else {
            continue;
        };

        if !light.casts_active_shadow() {
            continue;
        }

        let kind = match light.kind {
            LightKind::Directional => ShadowCasterKind::Directional,
            LightKind::Spot => ShadowCasterKind::Spot,
            LightKind::Point => ShadowCasterKind::Point,
            LightKind::Ambient
            | LightKind::Hemisphere { .. }
            | LightKind::RectArea { .. }
            | LightKind::Unknown => continue,
        };

        let Some(shadow) = light.shadow.as_mut() else {
            continue;
        };

        let stale = shadow
            .map
            .as_ref()
            .map_or(true, |m| m.resolution != shadow.map_size);

        if stale {
            shadow.map = Some(ShadowMap {
                resolution: shadow.map_size,
                generation: *generation,
            });
            *generation += 1;
        }

        if stale || shadow.needs_update || settings.needs_update || settings.auto_update {
            let up = if (target - world_position).normalize_or_zero().abs().y > 0.99 {
                Vec3::Z
            } else {
                Vec3::Y
            };
            let view = Mat4::look_at_rh(world_position, target, up);

            jobs.push(ShadowJob {
                node: id,
                kind,
                resolution: shadow.map_size,
                generation: shadow.map.as_ref().map_or(0, |m| m.generation),
                view_projection: shadow.projection * view,
                bias: shadow.bias,
                normal_bias: shadow.normal_bias,
                radius: shadow.radius,
            });
        }

        shadow.needs_update = false;
    }

    settings.needs_update = false;
    jobs
}
