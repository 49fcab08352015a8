use tracing::debug;

use crate::{
    camera::Camera,
    scene_graph::{NodeId, SceneGraph},
};

use super::{prepare_shadow_maps, FrameRenderer, RenderError, ShadowMapSettings};

/// A renderer without a GPU. It tracks everything a real renderer tracks on
/// the CPU (frames, shadow map allocations, released meshes) so scene
/// lifecycles can run in tests and on machines without an adapter.
#[derive(Debug)]
pub struct HeadlessRenderer {
    width: u32,
    height: u32,
    pixel_ratio: f32,
    shadow_map: ShadowMapSettings,
    frames_rendered: u64,
    shadow_generation: u64,
    shadow_passes: u64,
    meshes_drawn_last_frame: usize,
    released_meshes: Vec<NodeId>,
    disposed: bool,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            pixel_ratio: 1.0,
            shadow_map: ShadowMapSettings::default(),
            frames_rendered: 0,
            shadow_generation: 0,
            shadow_passes: 0,
            meshes_drawn_last_frame: 0,
            released_meshes: Vec::new(),
            disposed: false,
        }
    }

    /// Total number of shadow maps rendered.
    pub fn shadow_passes(&self) -> u64 {
        self.shadow_passes
    }

    /// Number of shadow maps allocated so far.
    pub fn shadow_maps_allocated(&self) -> u64 {
        self.shadow_generation
    }

    pub fn meshes_drawn_last_frame(&self) -> usize {
        self.meshes_drawn_last_frame
    }

    pub fn released_meshes(&self) -> &[NodeId] {
        &self.released_meshes
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRenderer for HeadlessRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn shadow_map(&self) -> &ShadowMapSettings {
        &self.shadow_map
    }

    fn shadow_map_mut(&mut self) -> &mut ShadowMapSettings {
        &mut self.shadow_map
    }

    fn render(&mut self, graph: &mut SceneGraph, _camera: &Camera) -> Result<(), RenderError> {
        if self.disposed {
            return Err(RenderError::Disposed);
        }

        let jobs = prepare_shadow_maps(&mut self.shadow_map, graph, &mut self.shadow_generation);
        self.shadow_passes += jobs.len() as u64;

        self.meshes_drawn_last_frame = graph
            .meshes()
            .into_iter()
            .filter(|id| graph.is_visible_in_world(*id))
            .count();
        self.frames_rendered += 1;

        Ok(())
    }

    fn release_mesh(&mut self, node: NodeId) {
        self.released_meshes.push(node);
    }

    fn dispose(&mut self) {
        if !self.disposed {
            debug!(frames = self.frames_rendered, "disposing headless renderer");
        }

        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}
