//! Full page backdrop of slowly drifting translucent shapes.
//!
//! Motion has two layers. Scrolling recomputes every object's base pose from
//! its baseline `AnimParams` as a bounded function of the scroll position.
//! Frames accumulate a slow spin and a bob for deep objects, plus a pulse for
//! wireframes. The node transform is always the base pose with the frame
//! layer composed on top, so neither update discards the other.
use std::{f32::consts::TAU, rc::Rc, time::Duration};

use glam::{Vec2, Vec3};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tracing::info;

use crate::{
    camera::Camera,
    color::Color,
    content::LoadedAsset,
    geometry::{BuiltinShape, Geometry},
    light_registry::{SceneTag, SharedLightRegistry},
    lighting::Light,
    math_utils::{damp, damp_vec3, rotate_around_pivot},
    platform::SystemTime,
    renderer::{Precision, RendererOptions, SharedRenderer, Viewport},
    scene_graph::{AnimParams, Material, MaterialKind, Mesh, NodeDesc, NodeId, NodeKind, SceneGraph, Transform},
};

use super::{DecorativeScene, SceneCore};

const PALETTE: [u32; 5] = [0x6666ff, 0x66ccff, 0x44aaff, 0x8866ff, 0xaa66ff];

/// The scroll phase advances by one per thousand pixels scrolled.
const SCROLL_SCALE: f32 = 0.001;

const MAIN_LIGHT_INTENSITY: f32 = 0.8;
const AMBIENT_INTENSITY: f32 = 0.3;

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundConfig {
    pub object_count: usize,
    pub low_quality_object_count: usize,
    /// Seed for object placement. Random when `None`.
    pub seed: Option<u64>,
    pub fps: u32,
    pub low_quality_fps: u32,
    /// Per frame easing of the camera toward the mouse.
    pub camera_drift: f32,
    /// Easing of the main light toward the mouse on each mouse update.
    pub light_follow: f32,
    pub shadow_refresh_interval: Duration,
}

impl BackgroundConfig {
    pub fn with_object_count(mut self, normal: usize, low_quality: usize) -> Self {
        self.object_count = normal;
        self.low_quality_object_count = low_quality;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_fps(mut self, fps: u32, low_quality_fps: u32) -> Self {
        self.fps = fps;
        self.low_quality_fps = low_quality_fps;
        self
    }

    pub fn with_shadow_refresh_interval(mut self, interval: Duration) -> Self {
        self.shadow_refresh_interval = interval;
        self
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            object_count: 20,
            low_quality_object_count: 10,
            seed: None,
            fps: 60,
            low_quality_fps: 24,
            camera_drift: 0.01,
            light_follow: 0.05,
            shadow_refresh_interval: Duration::from_secs(5),
        }
    }
}

/// Frame motion accumulated for one object on top of its scrolled pose.
#[derive(Copy, Clone, Debug, PartialEq)]
struct MotionLayer {
    /// Pose from the last scroll update, or the starting transform.
    base: Transform,
    spin: Vec3,
    drift: Vec3,
    pulse: f32,
}

impl MotionLayer {
    fn new(base: Transform) -> Self {
        Self {
            base,
            spin: Vec3::ZERO,
            drift: Vec3::ZERO,
            pulse: 1.0,
        }
    }

    fn compose(&self) -> Transform {
        Transform {
            position: self.base.position + self.drift,
            rotation: self.base.rotation + self.spin,
            scale: self.base.scale * self.pulse,
        }
    }
}

pub struct BackgroundScene {
    config: BackgroundConfig,
    core: SceneCore,
    low_quality: bool,
    objects: Vec<NodeId>,
    /// Parallel to `objects`.
    motion: Vec<MotionLayer>,
    main_light: Option<NodeId>,
    ambient_light: Option<NodeId>,
    mouse: Vec2,
    scroll_y: f32,
}

impl BackgroundScene {
    pub fn new(registry: SharedLightRegistry, config: BackgroundConfig) -> Self {
        Self {
            core: SceneCore::new(
                SceneTag::Background,
                registry,
                config.fps,
                config.shadow_refresh_interval,
            ),
            config,
            low_quality: false,
            objects: Vec::new(),
            motion: Vec::new(),
            main_light: None,
            ambient_light: None,
            mouse: Vec2::ZERO,
            scroll_y: 0.0,
        }
    }

    pub fn objects(&self) -> &[NodeId] {
        &self.objects
    }

    pub fn main_light(&self) -> Option<NodeId> {
        self.main_light
    }

    pub fn scroll_position(&self) -> f32 {
        self.scroll_y
    }

    /// Store the page scroll offset in pixels and re-pose every object for it.
    pub fn update_scroll_position(&mut self, y: f32) {
        self.scroll_y = y;
        self.apply_scroll();
    }

    fn add_lights(&mut self, graph: &mut SceneGraph) {
        let root = graph.root();

        // Left unnamed; the light registry numbers them per type.
        self.ambient_light = graph.add_child(
            root,
            "",
            NodeKind::Light(Light::ambient(Color::WHITE, AMBIENT_INTENSITY)),
        );

        let points = [
            (Color::WHITE, MAIN_LIGHT_INTENSITY, Vec3::new(0.0, 0.0, 2.0)),
            (Color::from_hex(0x4444ff), 0.5, Vec3::new(-5.0, 3.0, -3.0)),
            (Color::from_hex(0xff44aa), 0.3, Vec3::new(5.0, -2.0, -1.0)),
        ];

        for (index, (color, intensity, position)) in points.into_iter().enumerate() {
            let id = graph.attach(
                root,
                NodeDesc::new("", NodeKind::Light(Light::point(color, intensity))).with_position(position),
            );

            if index == 0 {
                self.main_light = id;
            }
        }
    }

    fn add_objects(&mut self, graph: &mut SceneGraph, count: usize, rng: &mut SmallRng) {
        let root = graph.root();
        let geometries: Vec<Rc<Geometry>> = BuiltinShape::ALL.iter().map(|s| Rc::new(s.build())).collect();

        for index in 0..count {
            let geometry = geometries[rng.gen_range(0..geometries.len())].clone();
            let material = random_material(rng);
            let transform = random_transform(index, rng);

            let mut mesh = Mesh::new(geometry, material);
            mesh.anim = Some(AnimParams {
                original_position: transform.position,
                original_rotation: transform.rotation,
                original_scale: transform.scale.x,
                rotation_speed: Vec3::new(
                    (rng.gen::<f32>() - 0.5) * 0.003,
                    (rng.gen::<f32>() - 0.5) * 0.003,
                    (rng.gen::<f32>() - 0.5) * 0.003,
                ),
                group: (index % 4) as u32,
            });

            let desc = NodeDesc::new(format!("background_object_{index}"), NodeKind::Mesh(mesh))
                .with_transform(transform);

            if let Some(id) = graph.attach(root, desc) {
                self.objects.push(id);
                self.motion.push(MotionLayer::new(transform));
            }
        }
    }

    fn apply_scroll(&mut self) {
        let factor = self.scroll_y * SCROLL_SCALE;
        let mut graph = self.core.graph().borrow_mut();

        for (index, (id, layer)) in self.objects.iter().zip(self.motion.iter_mut()).enumerate() {
            let Some(node) = graph.get_mut(*id) else {
                continue;
            };
            let NodeKind::Mesh(mesh) = &mut node.kind else {
                continue;
            };
            let Some(anim) = mesh.anim else {
                continue;
            };

            layer.base = scrolled_transform(index, &anim, factor);
            node.transform = layer.compose();

            if mesh.material.transparent {
                mesh.material.opacity = scrolled_opacity(index, factor);
            }
        }

        if let Some(light) = self.main_light.and_then(|id| graph.get_mut(id)) {
            light.transform.position = Vec3::new(
                (factor * 0.2).sin() * 3.0,
                1.0 + (factor * 0.15).cos(),
                2.0 + (factor * 0.1).sin(),
            );

            if let Some(light) = light.light_mut() {
                light.intensity = MAIN_LIGHT_INTENSITY + (factor * 0.8).sin() * 0.3;
                light.color = Color::from_hsl(
                    (factor * 0.01).rem_euclid(1.0),
                    0.5 + (factor * 0.05).sin() * 0.2,
                    0.6 + (factor * 0.07).sin() * 0.1,
                );
            }
        }

        if let Some(light) = self
            .ambient_light
            .and_then(|id| graph.get_mut(id))
            .and_then(|n| n.light_mut())
        {
            light.intensity = AMBIENT_INTENSITY + (factor * 0.1).sin() * 0.05;
        }
    }

    fn apply_frame_motion(&mut self, frame_elapsed: f32, frame_delta: f32) {
        let mut graph = self.core.graph().borrow_mut();

        for (index, (id, layer)) in self.objects.iter().zip(self.motion.iter_mut()).enumerate() {
            // Low quality only animates every other object.
            if self.low_quality && index % 2 != 0 {
                continue;
            }

            let Some(node) = graph.get_mut(*id) else {
                continue;
            };
            let NodeKind::Mesh(mesh) = &node.kind else {
                continue;
            };
            let pulses = mesh.material.wireframe && matches!(mesh.material.kind, MaterialKind::Phong { .. });

            layer.spin.x += 0.001 * if index % 2 == 1 { 1.0 } else { -1.0 };
            layer.spin.z += 0.001 * if index % 3 != 0 { 1.0 } else { -1.0 };

            if layer.base.position.z < -2.0 {
                let speed = 0.2 + (index % 4) as f32 * 0.05;
                layer.drift.y += (frame_elapsed * speed).sin() * 0.02 * frame_delta;
                layer.drift.x += (frame_elapsed * speed * 0.7).cos() * 0.02 * frame_delta;
            }

            if pulses {
                layer.pulse = 1.0 + (frame_elapsed * (0.5 + index as f32 * 0.1)).sin() * 0.03;
            }

            node.transform = layer.compose();
        }

        drop(graph);

        if self.mouse != Vec2::ZERO {
            if let Some(camera) = self.core.camera.as_mut() {
                let eye = camera.eye();
                let drift = self.config.camera_drift;
                let target = Vec3::new(self.mouse.x * 0.5, self.mouse.y * 0.3, eye.z);
                camera.set_eye(damp_vec3(eye, target, drift));
                camera.look_at(Vec3::ZERO);
            }
        }
    }
}

fn random_material(rng: &mut SmallRng) -> Material {
    let base = Color::from_hex(PALETTE[rng.gen_range(0..PALETTE.len())]);
    let mut jitter = || (rng.gen::<f32>() - 0.5) * 0.2;
    let color = Color::new(
        (base.r() + jitter()).clamp(0.0, 1.0),
        (base.g() + jitter()).clamp(0.0, 1.0),
        (base.b() + jitter()).clamp(0.0, 1.0),
    );

    if rng.gen::<f32>() > 0.5 {
        Material::phong(color, 30.0)
            .with_wireframe(true)
            .with_opacity(rng.gen::<f32>() * 0.4 + 0.4)
    } else {
        let opacity = rng.gen::<f32>() * 0.3 + 0.2;
        Material::phong(color, rng.gen::<f32>() * 100.0)
            .with_opacity(opacity)
            .with_double_sided(true)
    }
}

/// Every third object sits on a distant sphere, the rest in a slab behind the
/// camera's focus.
fn random_transform(index: usize, rng: &mut SmallRng) -> Transform {
    let position = if index % 3 == 0 {
        let radius = 15.0;
        let theta = rng.gen::<f32>() * TAU;
        let phi = (2.0 * rng.gen::<f32>() - 1.0).acos();
        Vec3::new(
            radius * phi.sin() * theta.cos(),
            radius * phi.sin() * theta.sin(),
            radius * phi.cos() - 10.0,
        )
    } else {
        Vec3::new(
            (rng.gen::<f32>() - 0.5) * 20.0,
            (rng.gen::<f32>() - 0.5) * 20.0,
            (rng.gen::<f32>() - 0.5) * 10.0 - 5.0,
        )
    };

    let rotation = Vec3::new(rng.gen::<f32>() * TAU, rng.gen::<f32>() * TAU, rng.gen::<f32>() * TAU);

    Transform {
        position,
        rotation,
        scale: Vec3::splat(rng.gen::<f32>() + 0.5),
    }
}

/// Pose of object `index` at scroll factor `factor`. Deeper objects travel
/// further; every third object orbits instead of sliding.
fn scrolled_transform(index: usize, anim: &AnimParams, factor: f32) -> Transform {
    let i = index as f32;
    let origin = anim.original_position;
    let rotation = anim.original_rotation;

    let parallax = (origin.z.abs() * 0.2).max(0.5);
    let depth_factor = (index % 4) as f32 * 0.15 + 0.7;
    let orbits = index % 3 == 0;

    let horizontal = (factor * 0.8 + i * 0.2).sin() * parallax;
    let vertical = (factor * 0.5 + i * 0.3).cos() * parallax * 0.7;

    let (x, z) = if orbits {
        // Elliptical: the depth axis swings half as far.
        let orbit = rotate_around_pivot(Vec2::new(origin.x, origin.z), 0.8, factor * 0.2 + i);
        (orbit.x, origin.z + (orbit.y - origin.z) * 0.5)
    } else {
        (origin.x + horizontal, origin.z + (factor * 0.3 + i).sin() * 0.2)
    };

    let pulse = 1.0 + (factor * (0.4 + (index % 5) as f32 * 0.1) + i * 0.25).sin() * (0.1 + (index % 3) as f32 * 0.05);
    let scale = anim.original_scale * pulse;

    Transform {
        position: Vec3::new(x, origin.y + vertical, z),
        rotation: Vec3::new(
            rotation.x + (factor * 0.5).sin() * if orbits { 0.3 } else { 0.15 },
            rotation.y + factor * depth_factor,
            rotation.z + (factor * 0.3 + i * 0.2).cos() * 0.1,
        ),
        scale: Vec3::new(
            scale * (1.0 + (factor * 0.3).sin() * 0.05),
            scale,
            scale * (1.0 + (factor * 0.2).cos() * 0.05),
        ),
    }
}

fn scrolled_opacity(index: usize, factor: f32) -> f32 {
    0.25 + (index % 5) as f32 * 0.05 + (factor * 0.4 + index as f32).sin() * 0.15
}

impl DecorativeScene for BackgroundScene {
    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn renderer_options(&self) -> RendererOptions {
        RendererOptions::new()
            .with_alpha(true)
            .with_antialias(!self.low_quality)
            .with_precision(Precision::Medium)
    }

    fn init(&mut self, renderer: SharedRenderer, viewport: Viewport) {
        let mut camera = Camera::new(
            75.0,
            0.1,
            100.0,
            Vec3::new(0.0, 0.0, 5.0),
            viewport.width,
            viewport.height,
        );
        camera.look_at(Vec3::ZERO);

        if !self
            .core
            .init_common(renderer, viewport, self.renderer_options(), camera)
        {
            return;
        }

        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let count = if self.low_quality {
            self.config.low_quality_object_count
        } else {
            self.config.object_count
        };

        {
            let scene = self.core.graph().clone();
            let mut graph = scene.borrow_mut();
            self.add_lights(&mut graph);
            self.add_objects(&mut graph, count, &mut rng);
        }

        self.core.refresh_lights();
        self.core.settle_if_loaded();

        // Pose objects for a page that was already scrolled before init.
        if self.scroll_y != 0.0 {
            self.apply_scroll();
        }

        info!(objects = self.objects.len(), low_quality = self.low_quality, "background scene initialized");
    }

    fn on_asset_loaded(&mut self, id: u64, result: anyhow::Result<LoadedAsset>) {
        // The background builds its shapes procedurally and requests nothing.
        if let Some(path) = self.core.complete_request(id) {
            let root = self.core.graph().borrow().root();
            match result {
                Ok(loaded) => {
                    self.core.merge_asset(root, loaded.root);
                }
                Err(error) => self.core.record_load_failure(&path, &error),
            }
            self.core.settle_if_loaded();
        }
    }

    fn update_mouse_position(&mut self, x: f32, y: f32) {
        self.mouse = Vec2::new(x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0));

        let Some(main_light) = self.main_light else {
            return;
        };

        let follow = self.config.light_follow;
        let mut graph = self.core.graph().borrow_mut();

        if let Some(node) = graph.get_mut(main_light) {
            let position = &mut node.transform.position;
            position.x = damp(position.x, self.mouse.x * 2.0, follow);
            position.y = damp(position.y, self.mouse.y, follow);
        }
    }

    fn set_low_quality_mode(&mut self, low_quality: bool) {
        self.low_quality = low_quality;
        self.core.set_fps(if low_quality {
            self.config.low_quality_fps
        } else {
            self.config.fps
        });
    }

    fn is_low_quality(&self) -> bool {
        self.low_quality
    }

    fn tick(&mut self, now: SystemTime) -> bool {
        let Some(frame) = self.core.begin_frame(now) else {
            return false;
        };

        self.apply_frame_motion(frame.elapsed.as_secs_f32(), frame.delta.as_secs_f32());
        self.core.finish_frame(frame);

        true
    }

    fn dispose(&mut self) {
        self.core.dispose();
        self.objects.clear();
        self.motion.clear();
        self.main_light = None;
        self.ambient_light = None;
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        light_registry::LightRegistry,
        lighting::LightType,
        renderer::{FrameRenderer, HeadlessRenderer},
        scenes::SceneState,
    };

    fn scene_with(config: BackgroundConfig, low_quality: bool) -> (BackgroundScene, Rc<RefCell<HeadlessRenderer>>) {
        let mut scene = BackgroundScene::new(LightRegistry::new_shared(), config);
        scene.set_low_quality_mode(low_quality);

        let renderer = Rc::new(RefCell::new(HeadlessRenderer::new()));
        let shared: SharedRenderer = renderer.clone();
        scene.init(shared, Viewport::new(1280, 720, 1.0));

        (scene, renderer)
    }

    fn seeded() -> (BackgroundScene, Rc<RefCell<HeadlessRenderer>>) {
        scene_with(BackgroundConfig::default().with_seed(7), false)
    }

    fn transforms(scene: &BackgroundScene) -> Vec<Transform> {
        let graph = scene.graph().borrow();
        scene
            .objects()
            .iter()
            .map(|id| graph.get(*id).unwrap().transform)
            .collect()
    }

    #[test]
    fn init_builds_objects_and_unnamed_lights() {
        let (scene, _) = seeded();

        assert_eq!(SceneState::Active, scene.state());
        assert_eq!(20, scene.objects().len());
        assert_eq!(0, scene.core().pending_requests());

        let registry = scene.core().registry().borrow();
        let lights = registry.lights_by_scene(SceneTag::Background);
        let names: Vec<&str> = lights.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(vec!["AmbientLight 1", "PointLight 1", "PointLight 2", "PointLight 3"], names);
        assert_eq!(LightType::Point, lights[1].light_type);
        assert_eq!(Some(Vec3::new(0.0, 0.0, 2.0)), lights[1].position);
    }

    #[test]
    fn low_quality_builds_fewer_objects() {
        let (scene, _) = scene_with(BackgroundConfig::default().with_seed(7), true);

        assert_eq!(10, scene.objects().len());
        assert!(!scene.renderer_options().antialias);
    }

    #[test]
    fn config_sets_object_count_and_rate() {
        let config = BackgroundConfig::default().with_seed(1).with_object_count(7, 4).with_fps(30, 12);
        let (mut scene, _) = scene_with(config, false);

        assert_eq!(7, scene.objects().len());
        assert_eq!(Duration::from_secs_f64(1.0 / 30.0), scene.core().frame_interval());

        scene.set_low_quality_mode(true);
        assert_eq!(Duration::from_secs_f64(1.0 / 12.0), scene.core().frame_interval());
    }

    #[test]
    fn same_seed_places_objects_identically() {
        let (a, _) = seeded();
        let (b, _) = seeded();

        assert_eq!(transforms(&a), transforms(&b));
    }

    #[test]
    fn every_third_object_starts_on_the_far_sphere() {
        let (scene, _) = seeded();
        let graph = scene.graph().borrow();

        for (index, id) in scene.objects().iter().enumerate() {
            let node = graph.get(*id).unwrap();
            let anim = node.mesh().unwrap().anim.unwrap();
            let position = anim.original_position;

            if index % 3 == 0 {
                let distance = (position - Vec3::new(0.0, 0.0, -10.0)).length();
                assert!((distance - 15.0).abs() < 1e-3);
            } else {
                assert!(position.x.abs() <= 10.0 && position.y.abs() <= 10.0);
                assert!((-10.0..=0.0).contains(&position.z));
            }

            assert!((0.5..1.5).contains(&anim.original_scale));
            assert_eq!((index % 4) as u32, anim.group);
        }
    }

    #[test]
    fn scroll_motion_is_bounded() {
        let (mut scene, _) = seeded();

        for step in 0..200 {
            scene.update_scroll_position(step as f32 * 750.0);

            let graph = scene.graph().borrow();
            for (index, id) in scene.objects().iter().enumerate() {
                let node = graph.get(*id).unwrap();
                let mesh = node.mesh().unwrap();
                let anim = mesh.anim.unwrap();
                let reach = (anim.original_position.z.abs() * 0.2).max(0.5) + 1.0;
                let offset = node.transform.position - anim.original_position;

                assert!(offset.abs().max_element() <= reach, "object {index} escaped");
                assert!(node.transform.scale.max_element() <= anim.original_scale * 1.3);
                assert!((0.0..=1.0).contains(&mesh.material.opacity));
            }
        }
    }

    #[test]
    fn scroll_motion_is_continuous() {
        let (mut scene, _) = seeded();

        scene.update_scroll_position(12_000.0);
        let before = transforms(&scene);
        scene.update_scroll_position(12_001.0);
        let after = transforms(&scene);

        for (a, b) in before.iter().zip(&after) {
            assert!((a.position - b.position).length() < 0.01);
            assert!((a.rotation - b.rotation).length() < 0.01);
        }
        assert_eq!(12_001.0, scene.scroll_position());
    }

    #[test]
    fn scrolling_after_frames_keeps_frame_motion() {
        let (mut scene, _) = seeded();
        let start = SystemTime::now();

        scene.update_scroll_position(1_000.0);
        for frame in 0..600 {
            scene.tick(start + Duration::from_millis(frame * 17));
        }

        let before = transforms(&scene);
        scene.update_scroll_position(1_001.0);
        let after = transforms(&scene);

        for (index, (a, b)) in before.iter().zip(&after).enumerate() {
            assert!((a.position - b.position).length() < 0.01, "object {index} jumped");
            assert!((a.rotation - b.rotation).length() < 0.01, "object {index} snapped back");
            assert!((a.scale - b.scale).length() < 0.01);
        }
    }

    #[test]
    fn scroll_cycles_the_main_light() {
        let (mut scene, _) = seeded();
        let light_of = |scene: &BackgroundScene| {
            let graph = scene.graph().borrow();
            graph.get(scene.main_light().unwrap()).unwrap().light().unwrap().clone()
        };

        scene.update_scroll_position(0.0);
        let start = light_of(&scene);
        scene.update_scroll_position(2_000.0);
        let scrolled = light_of(&scene);

        assert!((0.5..=1.1).contains(&scrolled.intensity));
        assert_ne!(start.intensity, scrolled.intensity);
        assert_ne!(start.color, scrolled.color);
    }

    #[test]
    fn mouse_moves_light_now_and_camera_per_frame() {
        let (mut scene, _) = seeded();
        let light_x = |scene: &BackgroundScene| {
            let graph = scene.graph().borrow();
            graph.get(scene.main_light().unwrap()).unwrap().transform.position.x
        };

        scene.update_mouse_position(1.0, 0.0);
        assert!((light_x(&scene) - 0.1).abs() < 1e-6);

        let start = SystemTime::now();
        for frame in 0..5 {
            scene.tick(start + Duration::from_millis(frame * 20));
        }

        let eye = scene.core().camera().unwrap().eye();
        assert!(eye.x > 0.0 && eye.x < 0.5);
        assert_eq!(5.0, eye.z);
    }

    #[test]
    fn camera_stays_put_without_mouse_input() {
        let (mut scene, renderer) = seeded();
        let start = SystemTime::now();

        for frame in 0..5 {
            scene.tick(start + Duration::from_millis(frame * 20));
        }

        assert_eq!(Vec3::new(0.0, 0.0, 5.0), scene.core().camera().unwrap().eye());
        assert_eq!(5, renderer.borrow().frames_rendered());
        assert_eq!(20, renderer.borrow().meshes_drawn_last_frame());
    }

    #[test]
    fn frame_pulse_stays_within_three_percent() {
        let (mut scene, _) = seeded();
        let start = SystemTime::now();

        for frame in 0..100 {
            scene.tick(start + Duration::from_millis(frame * 20));
        }

        let graph = scene.graph().borrow();
        for id in scene.objects() {
            let node = graph.get(*id).unwrap();
            let mesh = node.mesh().unwrap();
            if mesh.material.wireframe {
                let ratio = node.transform.scale.x / mesh.anim.unwrap().original_scale;
                assert!((0.97..=1.03).contains(&ratio));
            }
        }
    }

    #[test]
    fn low_quality_skips_odd_objects_per_frame() {
        let (mut scene, _) = scene_with(BackgroundConfig::default().with_seed(3), true);
        let before = transforms(&scene);
        let start = SystemTime::now();

        scene.tick(start);
        scene.tick(start + Duration::from_millis(100));

        let after = transforms(&scene);
        assert_eq!(before[1].rotation, after[1].rotation);
        assert_ne!(before[0].rotation, after[0].rotation);
    }

    #[test]
    fn shadow_refresh_runs_on_its_own_interval() {
        let config = BackgroundConfig::default()
            .with_seed(1)
            .with_shadow_refresh_interval(Duration::from_secs(5));
        let (mut scene, renderer) = scene_with(config, false);
        let start = SystemTime::now();

        scene.tick(start);
        scene.tick(start + Duration::from_secs(1));
        assert!(!renderer.borrow().shadow_map().needs_update);
        assert!(!renderer.borrow().shadow_map().enabled);

        scene.tick(start + Duration::from_secs(6));
        assert!(renderer.borrow().shadow_map().enabled);
    }

    #[test]
    fn resize_updates_camera_and_renderer() {
        let (mut scene, renderer) = seeded();

        scene.on_resize(Viewport::new(640, 480, 3.0));
        assert_eq!((640, 480), renderer.borrow().size());
        assert_eq!(1.5, renderer.borrow().pixel_ratio());
        assert!((scene.core().camera().unwrap().aspect() - 640.0 / 480.0).abs() < 1e-6);

        scene.on_resize(Viewport::new(0, 480, 1.0));
        assert_eq!((640, 480), renderer.borrow().size());
        assert_eq!(1, scene.drain_events().len());
    }

    #[test]
    fn resize_and_input_before_init_are_safe() {
        let mut scene = BackgroundScene::new(LightRegistry::new_shared(), BackgroundConfig::default());

        scene.on_resize(Viewport::new(640, 480, 1.0));
        scene.update_mouse_position(0.5, 0.5);
        scene.update_scroll_position(300.0);

        assert!(!scene.tick(SystemTime::now()));
        assert_eq!(SceneState::Uninitialized, scene.state());
        assert_eq!(300.0, scene.scroll_position());
    }

    #[test]
    fn dispose_releases_every_object() {
        let (mut scene, renderer) = seeded();

        scene.dispose();
        scene.dispose();

        assert_eq!(20, renderer.borrow().released_meshes().len());
        assert!(renderer.borrow().is_disposed());
        assert_eq!(0, scene.core().registry().borrow().scene_count());
        assert!(scene.objects().is_empty());
    }
}
