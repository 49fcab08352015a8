//! Canonical list of the lights shown in the light panel.
//!
//! The registry mirrors the light nodes of every scene handed to it. Records
//! are keyed by light name and scene tag; a mutation addressed to a name fans
//! out to the node with that name in every registered scene sharing the
//! record's tag. Scene owners receive the registry explicitly as a
//! `SharedLightRegistry`.
use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    color::Color,
    events::{EventQueue, SceneEvent},
    lighting::{Light, LightKind, LightType, ShadowAlgorithm, ShadowCamera, ShadowCameraError},
    renderer::SharedRenderer,
    scene_graph::{NodeId, SceneGraph},
};

pub type SharedScene = Rc<RefCell<SceneGraph>>;
pub type SharedLightRegistry = Rc<RefCell<LightRegistry>>;

/// Partitions lights and scenes into independently managed groups.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneTag {
    Navbar,
    Background,
}

impl SceneTag {
    pub const ALL: [SceneTag; 2] = [SceneTag::Navbar, SceneTag::Background];
}

impl fmt::Display for SceneTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SceneTag::Navbar => "navbar",
            SceneTag::Background => "background",
        })
    }
}

/// The light panel's view of one light.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleLight {
    pub name: String,
    #[serde(rename = "type")]
    pub light_type: LightType,
    pub intensity: f32,
    /// Lowercase `#rrggbb`.
    pub color: String,
    pub enabled: bool,
    /// Absent for ambient lights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    /// Present only for lights that can cast shadows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast_shadow: Option<bool>,
    pub scene: SceneTag,
}

impl SimpleLight {
    fn from_node(name: &str, light: &Light, visible: bool, position: Vec3, scene: SceneTag) -> Self {
        Self {
            name: name.to_string(),
            light_type: light.light_type(),
            intensity: light.intensity,
            color: light.color.to_hex_string(),
            enabled: visible,
            position: light.kind.has_position().then_some(position),
            cast_shadow: light.kind.can_cast_shadow().then_some(light.cast_shadow),
            scene,
        }
    }
}

/// Shadow quality presets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl ShadowQuality {
    pub fn map_size(&self) -> u32 {
        match self {
            ShadowQuality::Low => 512,
            ShadowQuality::Medium => 1024,
            ShadowQuality::High => 2048,
        }
    }

    pub fn algorithm(&self) -> ShadowAlgorithm {
        match self {
            ShadowQuality::Low => ShadowAlgorithm::Basic,
            ShadowQuality::Medium => ShadowAlgorithm::Pcf,
            ShadowQuality::High => ShadowAlgorithm::PcfSoft,
        }
    }
}

/// Half extent of the orthographic shadow frustum used by directional lights.
const DIRECTIONAL_SHADOW_EXTENT: f32 = 15.0;

fn directional_shadow_camera() -> ShadowCamera {
    ShadowCamera::Orthographic {
        left: -DIRECTIONAL_SHADOW_EXTENT,
        right: DIRECTIONAL_SHADOW_EXTENT,
        top: DIRECTIONAL_SHADOW_EXTENT,
        bottom: -DIRECTIONAL_SHADOW_EXTENT,
        near: 0.5,
        far: 50.0,
    }
}

/// Apply the per kind shadow presets to `light` and refresh its shadow
/// projection. Lights without shadow state are left untouched.
pub fn configure_shadows_for_light(light: &mut Light) -> Result<(), ShadowCameraError> {
    let kind = light.kind.clone();
    let Some(shadow) = light.shadow.as_mut() else {
        return Ok(());
    };

    shadow.map_size = 1024;

    match kind {
        LightKind::Directional => {
            shadow.camera = directional_shadow_camera();
            shadow.bias = -0.0005;
            shadow.normal_bias = 0.02;
            shadow.radius = 2.0;
        }
        LightKind::Spot => {
            shadow.bias = -0.0003;
            shadow.camera.set_near_far(0.5, 25.0);
        }
        LightKind::Point => {
            shadow.camera.set_near_far(0.5, 15.0);
            shadow.bias = -0.0005;
        }
        LightKind::Ambient
        | LightKind::Hemisphere { .. }
        | LightKind::RectArea { .. }
        | LightKind::Unknown => {}
    }

    shadow.update_projection_matrix()
}

/// Fields restored onto a light after the registry is rebuilt.
#[derive(Clone, Debug)]
struct LightSnapshot {
    intensity: f32,
    color: String,
    enabled: bool,
    cast_shadow: Option<bool>,
}

/// A partial update to a light. Only fields that are `Some` are applied.
#[derive(Clone, Debug, Default)]
struct LightChanges {
    intensity: Option<f32>,
    color: Option<Color>,
    enabled: Option<bool>,
    position: Option<Vec3>,
    cast_shadow: Option<bool>,
}

struct ManagedScene {
    scene: SharedScene,
    tag: SceneTag,
    renderer: Option<SharedRenderer>,
}

#[derive(Default)]
pub struct LightRegistry {
    lights: Vec<SimpleLight>,
    scenes: Vec<ManagedScene>,
    events: EventQueue,
}

impl LightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> SharedLightRegistry {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Start managing `scene` under `tag`. Registering the same scene again is
    /// a no-op, except that a renderer is attached if none was before.
    pub fn register_scene(
        &mut self,
        scene: &SharedScene,
        tag: SceneTag,
        renderer: Option<SharedRenderer>,
    ) {
        if let Some(existing) = self.scenes.iter_mut().find(|m| Rc::ptr_eq(&m.scene, scene)) {
            if existing.renderer.is_none() {
                existing.renderer = renderer;
            }
            return;
        }

        debug!(%tag, "registering scene with light registry");
        self.scenes.push(ManagedScene {
            scene: scene.clone(),
            tag,
            renderer,
        });
    }

    /// Stop managing `scene` and drop the records of its tag once no other
    /// registered scene carries that tag. Other scenes are left untouched.
    pub fn unregister_scene(&mut self, scene: &SharedScene) {
        let Some(index) = self.scenes.iter().position(|m| Rc::ptr_eq(&m.scene, scene)) else {
            return;
        };
        let tag = self.scenes.remove(index).tag;

        if !self.scenes.iter().any(|m| m.tag == tag) {
            self.lights.retain(|l| l.scene != tag);
        }
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn all_lights(&self) -> &[SimpleLight] {
        &self.lights
    }

    pub fn lights_by_scene(&self, tag: SceneTag) -> Vec<SimpleLight> {
        self.lights.iter().filter(|l| l.scene == tag).cloned().collect()
    }

    pub fn find(&self, name: &str, tag: SceneTag) -> Option<&SimpleLight> {
        self.lights.iter().find(|l| l.name == name && l.scene == tag)
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain()
    }

    /// Rebuild the records from the live scene graphs.
    ///
    /// With `scope` set only the given registered scenes are traversed, and
    /// only the records of their tags are rebuilt; records of other tags are
    /// kept. Mutable fields of records that existed before the refresh are
    /// restored onto both the node and the new record.
    pub fn refresh_lights(&mut self, scope: Option<&[SharedScene]>) {
        let snapshot: HashMap<(String, SceneTag), LightSnapshot> = self
            .lights
            .iter()
            .map(|l| {
                (
                    (l.name.clone(), l.scene),
                    LightSnapshot {
                        intensity: l.intensity,
                        color: l.color.clone(),
                        enabled: l.enabled,
                        cast_shadow: l.cast_shadow,
                    },
                )
            })
            .collect();

        let in_scope: Vec<usize> = self.scoped_scene_indices(scope);
        let rebuilt_tags: Vec<SceneTag> = match scope {
            None => SceneTag::ALL.to_vec(),
            Some(_) => in_scope.iter().map(|i| self.scenes[*i].tag).collect(),
        };

        self.lights.retain(|l| !rebuilt_tags.contains(&l.scene));

        for index in in_scope {
            let tag = self.scenes[index].tag;
            let scene = self.scenes[index].scene.clone();
            let mut graph = scene.borrow_mut();

            for id in graph.lights() {
                self.add_light_record(&mut graph, id, tag, &snapshot);
            }
        }

        info!(lights = self.lights.len(), "refreshed light registry");
    }

    fn add_light_record(
        &mut self,
        graph: &mut SceneGraph,
        id: NodeId,
        tag: SceneTag,
        snapshot: &HashMap<(String, SceneTag), LightSnapshot>,
    ) {
        let position = graph.get(id).map(|n| n.transform.position).unwrap_or_default();
        let Some(node) = graph.get_mut(id) else {
            return;
        };
        let Some(light_type) = node.light().map(Light::light_type) else {
            return;
        };

        if node.name.trim().is_empty() {
            let same_type = self
                .lights
                .iter()
                .filter(|l| l.light_type == light_type && l.scene == tag)
                .count();
            node.name = format!("{} {}", light_type.type_name(), same_type + 1);
        }

        let name = node.name.clone();

        if let Some(saved) = snapshot.get(&(name.clone(), tag)) {
            node.visible = saved.enabled;
            if let Some(light) = node.light_mut() {
                light.intensity = saved.intensity;
                if let Ok(color) = Color::from_hex_str(&saved.color) {
                    light.color = color;
                }
                if let Some(cast_shadow) = saved.cast_shadow {
                    light.cast_shadow = cast_shadow;
                }
            }
        }

        let Some(light) = node.light() else {
            return;
        };
        let record = SimpleLight::from_node(&name, light, node.visible, position, tag);

        match self.lights.iter_mut().find(|l| l.name == name && l.scene == tag) {
            Some(existing) => *existing = record,
            None => self.lights.push(record),
        }
    }

    pub fn set_light_intensity(&mut self, name: &str, intensity: f32) {
        self.update_light(
            name,
            LightChanges {
                intensity: Some(intensity.max(0.0)),
                ..Default::default()
            },
        );
    }

    pub fn set_light_color(&mut self, name: &str, hex: &str) {
        match Color::from_hex_str(hex) {
            Ok(color) => self.update_light(
                name,
                LightChanges {
                    color: Some(color),
                    ..Default::default()
                },
            ),
            Err(_) => self.events.push(SceneEvent::InvalidColor {
                target: name.to_string(),
                value: hex.to_string(),
            }),
        }
    }

    pub fn set_light_visibility(&mut self, name: &str, visible: bool) {
        self.update_light(
            name,
            LightChanges {
                enabled: Some(visible),
                ..Default::default()
            },
        );
    }

    pub fn set_light_cast_shadow(&mut self, name: &str, cast_shadow: bool) {
        self.update_light(
            name,
            LightChanges {
                cast_shadow: Some(cast_shadow),
                ..Default::default()
            },
        );
    }

    /// Move a light. Ignored for lights without a position.
    pub fn set_light_position(&mut self, name: &str, position: Vec3) {
        self.update_light(
            name,
            LightChanges {
                position: Some(position),
                ..Default::default()
            },
        );
    }

    /// Apply `changes` to every record named `name` (at most one per tag) and
    /// fan them out to the nodes with that name in the scenes of each tag.
    fn update_light(&mut self, name: &str, changes: LightChanges) {
        let mut touched = Vec::new();

        for record in self.lights.iter_mut().filter(|l| l.name == name) {
            let mut changes = changes.clone();

            if record.position.is_none() {
                changes.position = None;
            }

            if record.cast_shadow.is_none() {
                changes.cast_shadow = None;
            }

            if let Some(intensity) = changes.intensity {
                record.intensity = intensity;

                // Zero intensity switches the light off. A positive intensity
                // leaves `enabled` alone.
                if intensity == 0.0 {
                    changes.enabled = Some(false);
                }
            }

            if let Some(color) = changes.color {
                record.color = color.to_hex_string();
            }

            if let Some(enabled) = changes.enabled {
                record.enabled = enabled;
            }

            if let Some(position) = changes.position {
                record.position = Some(position);
            }

            if let Some(cast_shadow) = changes.cast_shadow {
                record.cast_shadow = Some(cast_shadow);
            }

            touched.push((record.scene, changes));
        }

        if touched.is_empty() {
            self.events.push(SceneEvent::UnknownLight {
                name: name.to_string(),
            });
            return;
        }

        for (tag, changes) in touched {
            for index in 0..self.scenes.len() {
                if self.scenes[index].tag != tag {
                    continue;
                }

                let scene = self.scenes[index].scene.clone();
                let mut graph = scene.borrow_mut();

                if let Some(id) = graph.find_by_name(name) {
                    self.apply_changes(&mut graph, id, name, &changes);
                }
            }
        }
    }

    fn apply_changes(&mut self, graph: &mut SceneGraph, id: NodeId, name: &str, changes: &LightChanges) {
        let Some(node) = graph.get_mut(id) else {
            return;
        };

        if let Some(enabled) = changes.enabled {
            node.visible = enabled;
        }

        if let Some(position) = changes.position {
            node.transform.position = position;
        }

        let Some(light) = node.light_mut() else {
            return;
        };

        if let Some(intensity) = changes.intensity {
            light.intensity = intensity;
        }

        if let Some(color) = changes.color {
            light.color = color;
        }

        if let Some(cast_shadow) = changes.cast_shadow {
            light.cast_shadow = cast_shadow;

            if cast_shadow {
                if let Err(error) = configure_shadows_for_light(light) {
                    self.events.push(SceneEvent::ShadowCameraUpdateFailed {
                        light: name.to_string(),
                        error,
                    });
                }
            }
        }
    }

    /// Apply a shadow quality preset to the renderers and shadow casting
    /// lights of the registered scenes in `scope` (all when `None`). Cached
    /// shadow maps are dropped so they regenerate at the new resolution.
    pub fn configure_shadow_quality(&mut self, quality: ShadowQuality, scope: Option<&[SharedScene]>) {
        info!(?quality, "configuring shadow quality");

        for index in self.scoped_scene_indices(scope) {
            if let Some(renderer) = &self.scenes[index].renderer {
                let mut renderer = renderer.borrow_mut();
                let shadow_map = renderer.shadow_map_mut();
                shadow_map.enabled = true;
                shadow_map.algorithm = quality.algorithm();
            }

            let scene = self.scenes[index].scene.clone();
            let mut graph = scene.borrow_mut();

            for id in graph.lights() {
                let Some(node) = graph.get_mut(id) else {
                    continue;
                };
                let name = node.name.clone();
                let Some(light) = node.light_mut() else {
                    continue;
                };

                if !light.cast_shadow {
                    continue;
                }

                let kind = light.kind.clone();
                let Some(shadow) = light.shadow.as_mut() else {
                    continue;
                };

                shadow.map_size = quality.map_size();

                match kind {
                    LightKind::Directional => {
                        shadow.camera = directional_shadow_camera();
                        shadow.bias = -0.0005;
                    }
                    LightKind::Point => {
                        shadow.camera.set_near_far(0.5, 25.0);
                        shadow.bias = -0.001;
                    }
                    LightKind::Spot
                    | LightKind::Ambient
                    | LightKind::Hemisphere { .. }
                    | LightKind::RectArea { .. }
                    | LightKind::Unknown => {}
                }

                if let Err(error) = shadow.update_projection_matrix() {
                    self.events
                        .push(SceneEvent::ShadowCameraUpdateFailed { light: name, error });
                }

                shadow.invalidate_map();
            }
        }
    }

    /// Mark the renderers and every active shadow of the registered scenes in
    /// `scope` (all when `None`) as needing an update, and drop cached shadow
    /// maps.
    pub fn force_update_shadows(&mut self, scope: Option<&[SharedScene]>) {
        for index in self.scoped_scene_indices(scope) {
            if let Some(renderer) = &self.scenes[index].renderer {
                let mut renderer = renderer.borrow_mut();
                let shadow_map = renderer.shadow_map_mut();
                shadow_map.enabled = true;
                shadow_map.needs_update = true;
            }

            let scene = self.scenes[index].scene.clone();
            let mut graph = scene.borrow_mut();

            for id in graph.lights() {
                let Some(node) = graph.get_mut(id) else {
                    continue;
                };
                let name = node.name.clone();
                let Some(light) = node.light_mut() else {
                    continue;
                };

                if !light.cast_shadow {
                    continue;
                }

                let Some(shadow) = light.shadow.as_mut() else {
                    continue;
                };

                shadow.needs_update = true;

                if let Err(error) = shadow.update_projection_matrix() {
                    self.events
                        .push(SceneEvent::ShadowCameraUpdateFailed { light: name, error });
                }

                shadow.invalidate_map();
            }
        }
    }

    fn scoped_scene_indices(&self, scope: Option<&[SharedScene]>) -> Vec<usize> {
        (0..self.scenes.len())
            .filter(|i| match scope {
                None => true,
                Some(scenes) => scenes.iter().any(|s| Rc::ptr_eq(s, &self.scenes[*i].scene)),
            })
            .collect()
    }
}

impl fmt::Debug for LightRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightRegistry")
            .field("lights", &self.lights)
            .field("scenes", &self.scenes.len())
            .field("pending_events", &self.events.len())
            .finish()
    }
}
