//! Models floating behind the navigation bar. They lean toward the mouse
//! while the navbar is expanded and settle flat when it shrinks.
use std::{collections::HashMap, time::Duration};

use glam::{Vec2, Vec3};
use tracing::{debug, info};

use crate::{
    animation::ActionHandle,
    camera::Camera,
    color::{Color, DEFAULT_ACCENT},
    content::LoadedAsset,
    events::SceneEvent,
    light_registry::{SceneTag, SharedLightRegistry},
    lighting::Light,
    math_utils::{damp, lerp},
    platform::SystemTime,
    renderer::{PowerPreference, Precision, RendererOptions, SharedRenderer, Viewport},
    scene_graph::{NodeDesc, NodeId, NodeKind},
};

use super::{DecorativeScene, SceneCore};

pub const AMBIENT_LIGHT_NAME: &str = "Lumière ambiante";
pub const DIRECTIONAL_LIGHT_NAME: &str = "Lumière directionnelle";

/// Models the navbar loads. Clip playback starts once every one of them has
/// reported back, so their animations stay in phase.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NavbarAsset {
    Icosahedron,
    Torus,
    Scene,
}

impl NavbarAsset {
    pub const ALL: [NavbarAsset; 3] = [NavbarAsset::Icosahedron, NavbarAsset::Torus, NavbarAsset::Scene];

    pub fn path(&self) -> &'static str {
        match self {
            NavbarAsset::Icosahedron => "models/navbar_ico.obj",
            NavbarAsset::Torus => "models/navbar_torus.obj",
            NavbarAsset::Scene => "models/navbar_scene.obj",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NavbarConfig {
    pub fps: u32,
    pub low_quality_fps: u32,
    /// Fraction of the remaining distance the rotation covers each frame.
    pub smoothing: f32,
    /// Same as `smoothing`, used while settling into the shrunk state.
    pub shrink_smoothing: f32,
    pub bob_amplitude: f32,
    /// Radians per second.
    pub bob_speed: f32,
    pub shadow_refresh_interval: Duration,
}

impl NavbarConfig {
    pub fn with_fps(mut self, fps: u32, low_quality_fps: u32) -> Self {
        self.fps = fps;
        self.low_quality_fps = low_quality_fps;
        self
    }

    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_shadow_refresh_interval(mut self, interval: Duration) -> Self {
        self.shadow_refresh_interval = interval;
        self
    }
}

impl Default for NavbarConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            low_quality_fps: 24,
            smoothing: 0.03,
            shrink_smoothing: 0.05,
            bob_amplitude: 0.1,
            bob_speed: 0.3,
            shadow_refresh_interval: Duration::from_secs(5),
        }
    }
}

pub struct NavbarScene {
    config: NavbarConfig,
    core: SceneCore,
    low_quality: bool,
    /// Parent of every loaded model. Mouse rotation and bobbing move it.
    pivot: Option<NodeId>,
    /// (x, y) Euler rotation the pivot eases toward.
    target_rotation: Vec2,
    current_rotation: Vec2,
    shrunk: bool,
    current_color: String,
    requests: HashMap<u64, NavbarAsset>,
    loaded: Vec<NavbarAsset>,
    deferred_actions: Vec<ActionHandle>,
}

impl NavbarScene {
    pub fn new(registry: SharedLightRegistry, config: NavbarConfig) -> Self {
        Self {
            core: SceneCore::new(
                SceneTag::Navbar,
                registry,
                config.fps,
                config.shadow_refresh_interval,
            ),
            config,
            low_quality: false,
            pivot: None,
            target_rotation: Vec2::ZERO,
            current_rotation: Vec2::ZERO,
            shrunk: false,
            current_color: DEFAULT_ACCENT.to_string(),
            requests: HashMap::new(),
            loaded: Vec::new(),
            deferred_actions: Vec::new(),
        }
    }

    pub fn pivot(&self) -> Option<NodeId> {
        self.pivot
    }

    pub fn is_shrunk(&self) -> bool {
        self.shrunk
    }

    /// Enter or leave the shrunk navbar state. Shrinking drops the mouse
    /// target so the models settle flat.
    pub fn set_shrunk(&mut self, shrunk: bool) {
        self.shrunk = shrunk;

        if shrunk {
            self.target_rotation = Vec2::ZERO;
        }
    }

    pub fn target_rotation(&self) -> Vec2 {
        self.target_rotation
    }

    pub fn current_color(&self) -> &str {
        &self.current_color
    }

    /// Recolor every mesh whose material follows the accent color. Invalid
    /// colors change nothing.
    pub fn set_current_color(&mut self, hex: &str) {
        let color = match Color::from_hex_str(hex) {
            Ok(color) => color,
            Err(_) => {
                self.core.push_event(SceneEvent::InvalidColor {
                    target: "accent".to_string(),
                    value: hex.to_string(),
                });
                return;
            }
        };

        self.current_color = color.to_hex_string();

        let mut graph = self.core.graph().borrow_mut();
        for id in graph.meshes() {
            if let Some(mesh) = graph.get_mut(id).and_then(|n| n.mesh_mut()) {
                if mesh.material.follows_accent_color() {
                    mesh.material.color = color;
                }
            }
        }
    }

    pub fn all_assets_loaded(&self) -> bool {
        NavbarAsset::ALL.iter().all(|a| self.loaded.contains(a))
    }

    /// Clip actions waiting for the remaining assets.
    pub fn deferred_actions(&self) -> &[ActionHandle] {
        &self.deferred_actions
    }

    fn merge_loaded(&mut self, asset: NavbarAsset, loaded: LoadedAsset) {
        let parent = match self.pivot {
            Some(pivot) => pivot,
            None => self.core.graph().borrow().root(),
        };

        let Some(node) = self.core.merge_asset(parent, loaded.root) else {
            debug!(?asset, "asset arrived after its parent was removed");
            return;
        };

        let playback = self
            .core
            .animation
            .setup_clip_playback(node, &loaded.clips, false);
        self.deferred_actions.extend(playback.actions);

        debug!(?asset, clips = loaded.clips.len(), "merged navbar asset");
    }

    fn apply_motion(&mut self, elapsed_secs: f32) {
        let smoothing = self.config.smoothing;
        self.current_rotation.x = damp(self.current_rotation.x, self.target_rotation.x, smoothing);
        self.current_rotation.y = damp(self.current_rotation.y, self.target_rotation.y, smoothing);

        let Some(pivot) = self.pivot else {
            return;
        };

        let mut graph = self.core.graph().borrow_mut();
        let Some(node) = graph.get_mut(pivot) else {
            return;
        };
        let transform = &mut node.transform;

        if self.shrunk {
            let factor = self.config.shrink_smoothing;
            transform.position.y = lerp(transform.position.y, 0.0, factor);
            transform.rotation.x = lerp(transform.rotation.x, 0.0, factor);
            transform.rotation.y = lerp(transform.rotation.y, 0.0, factor);
        } else {
            transform.rotation.x = self.current_rotation.x;
            transform.rotation.y = self.current_rotation.y;
            transform.position.y = (elapsed_secs * self.config.bob_speed).sin() * self.config.bob_amplitude;
        }
    }
}

impl DecorativeScene for NavbarScene {
    fn core(&self) -> &SceneCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SceneCore {
        &mut self.core
    }

    fn renderer_options(&self) -> RendererOptions {
        if self.low_quality {
            RendererOptions::new()
                .with_antialias(false)
                .with_precision(Precision::Low)
                .with_power_preference(PowerPreference::LowPower)
        } else {
            RendererOptions::new()
        }
    }

    fn init(&mut self, renderer: SharedRenderer, viewport: Viewport) {
        let camera = Camera::new(
            75.0,
            0.1,
            1000.0,
            Vec3::new(0.0, 0.0, 5.0),
            viewport.width,
            viewport.height,
        );

        if !self
            .core
            .init_common(renderer, viewport, self.renderer_options(), camera)
        {
            return;
        }

        {
            let mut graph = self.core.graph().borrow_mut();
            let root = graph.root();

            graph.add_child(
                root,
                AMBIENT_LIGHT_NAME,
                NodeKind::Light(Light::ambient(Color::WHITE, 0.4)),
            );
            graph.attach(
                root,
                NodeDesc::new(
                    DIRECTIONAL_LIGHT_NAME,
                    NodeKind::Light(Light::directional(Color::WHITE, 0.05)),
                )
                .with_position(Vec3::new(0.0, 1.0, 2.0)),
            );

            self.pivot = graph.add_child(root, "navbar_pivot", NodeKind::Group);
        }

        self.core.refresh_lights();

        for asset in NavbarAsset::ALL {
            let id = self.core.request_asset(asset.path());
            self.requests.insert(id, asset);
        }

        info!(low_quality = self.low_quality, "navbar scene initialized");
    }

    fn on_asset_loaded(&mut self, id: u64, result: anyhow::Result<LoadedAsset>) {
        let Some(path) = self.core.complete_request(id) else {
            return;
        };
        let Some(asset) = self.requests.remove(&id) else {
            return;
        };

        match result {
            Ok(loaded) => self.merge_loaded(asset, loaded),
            Err(error) => self.core.record_load_failure(&path, &error),
        }

        // A failed asset still counts so it cannot hold back the others.
        if !self.loaded.contains(&asset) {
            self.loaded.push(asset);
        }

        if self.all_assets_loaded() && !self.deferred_actions.is_empty() {
            info!(actions = self.deferred_actions.len(), "starting navbar clip playback");
            self.core.animation.play(&self.deferred_actions);
            self.deferred_actions.clear();
        }

        self.core.settle_if_loaded();
    }

    fn update_mouse_position(&mut self, x: f32, y: f32) {
        if self.shrunk {
            self.target_rotation = Vec2::ZERO;
            return;
        }

        let x = x.clamp(-1.0, 1.0);
        let y = y.clamp(-1.0, 1.0);
        self.target_rotation = Vec2::new(y * 0.1, x * 0.2);
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

        self.apply_motion(frame.elapsed.as_secs_f32());
        self.core.finish_frame(frame);

        true
    }

    fn dispose(&mut self) {
        self.core.dispose();
        self.pivot = None;
        self.requests.clear();
        self.deferred_actions.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        animation::{AnimationClip, Channel, KeyframeTrack},
        geometry::Geometry,
        light_registry::LightRegistry,
        renderer::{FrameRenderer, HeadlessRenderer},
        scene_graph::{Material, Mesh},
        scenes::SceneState,
    };

    fn headless() -> (Rc<RefCell<HeadlessRenderer>>, SharedRenderer) {
        let renderer = Rc::new(RefCell::new(HeadlessRenderer::new()));
        let shared: SharedRenderer = renderer.clone();
        (renderer, shared)
    }

    fn viewport() -> Viewport {
        Viewport::new(800, 200, 2.0)
    }

    fn model(name: &str, mesh_name: &str, with_clip: bool) -> LoadedAsset {
        let mesh = Mesh::new(
            Rc::new(Geometry::icosahedron(1.0)),
            Material::standard(Color::from_hex(0x888888), 0.5, 0.1),
        );
        let asset = LoadedAsset::new(
            NodeDesc::group(name).with_child(NodeDesc::new(mesh_name, NodeKind::Mesh(mesh))),
        );

        if !with_clip {
            return asset;
        }

        asset.with_clips(vec![AnimationClip::new(
            format!("{mesh_name}_spin"),
            vec![KeyframeTrack {
                target: mesh_name.to_string(),
                channel: Channel::Rotation,
                times: vec![0.0, 2.0],
                values: vec![Vec3::ZERO, Vec3::new(0.0, 6.0, 0.0)],
            }],
        )])
    }

    fn initialized() -> (NavbarScene, Rc<RefCell<HeadlessRenderer>>, Vec<(u64, NavbarAsset)>) {
        let mut scene = NavbarScene::new(LightRegistry::new_shared(), NavbarConfig::default());
        let (renderer, shared) = headless();
        scene.init(shared, viewport());

        let requests = scene
            .take_asset_requests()
            .into_iter()
            .map(|r| {
                let asset = NavbarAsset::ALL
                    .into_iter()
                    .find(|a| a.path() == r.path)
                    .unwrap();
                (r.id, asset)
            })
            .collect();

        (scene, renderer, requests)
    }

    fn id_of(requests: &[(u64, NavbarAsset)], asset: NavbarAsset) -> u64 {
        requests.iter().find(|(_, a)| *a == asset).unwrap().0
    }

    #[test]
    fn init_adds_named_lights_and_requests_assets() {
        let (scene, renderer, requests) = initialized();

        assert_eq!(SceneState::Initializing, scene.state());
        assert_eq!(3, requests.len());
        assert_eq!((800, 200), renderer.borrow().size());
        assert_eq!(1.5, renderer.borrow().pixel_ratio());

        let registry = scene.core().registry().borrow();
        let ambient = registry.find(AMBIENT_LIGHT_NAME, SceneTag::Navbar).unwrap();
        assert_eq!(0.4, ambient.intensity);
        let directional = registry.find(DIRECTIONAL_LIGHT_NAME, SceneTag::Navbar).unwrap();
        assert_eq!(Some(Vec3::new(0.0, 1.0, 2.0)), directional.position);
    }

    #[test]
    fn clip_playback_waits_for_every_asset() {
        let (mut scene, _, requests) = initialized();

        scene.on_asset_loaded(
            id_of(&requests, NavbarAsset::Icosahedron),
            Ok(model("navbar_ico", "Icosahedron", true)),
        );
        scene.on_asset_loaded(
            id_of(&requests, NavbarAsset::Torus),
            Ok(model("navbar_torus", "Torus", true)),
        );

        let deferred = scene.deferred_actions().to_vec();
        assert_eq!(2, deferred.len());
        assert!(deferred.iter().all(|a| !scene.core().animation().is_playing(*a)));
        assert_eq!(SceneState::Initializing, scene.state());

        scene.on_asset_loaded(
            id_of(&requests, NavbarAsset::Scene),
            Ok(model("navbar_scene", "Floor", false)),
        );

        assert!(scene.all_assets_loaded());
        assert!(deferred.iter().all(|a| scene.core().animation().is_playing(*a)));
        assert_eq!(SceneState::Active, scene.state());
    }

    #[test]
    fn failed_asset_does_not_block_playback() {
        let (mut scene, _, requests) = initialized();

        scene.on_asset_loaded(
            id_of(&requests, NavbarAsset::Icosahedron),
            Ok(model("navbar_ico", "Icosahedron", true)),
        );
        scene.on_asset_loaded(
            id_of(&requests, NavbarAsset::Torus),
            Err(anyhow::anyhow!("404")),
        );
        scene.on_asset_loaded(
            id_of(&requests, NavbarAsset::Scene),
            Err(anyhow::anyhow!("404")),
        );

        assert!(scene.all_assets_loaded());
        assert!(scene.deferred_actions().is_empty());
        assert_eq!(1, scene.core().animation().mixer_count());

        let events = scene.drain_events();
        assert_eq!(2, events.len());
        assert!(matches!(
            &events[0],
            SceneEvent::AssetLoadFailed { path, .. } if path == "models/navbar_torus.obj"
        ));
    }

    #[test]
    fn unknown_and_late_completions_are_ignored() {
        let (mut scene, _, requests) = initialized();
        let ico = id_of(&requests, NavbarAsset::Icosahedron);

        scene.on_asset_loaded(99, Ok(model("stray", "Stray", false)));
        assert_eq!(vec![SceneEvent::UnexpectedAsset { id: 99 }], scene.drain_events());

        scene.dispose();
        scene.on_asset_loaded(ico, Ok(model("navbar_ico", "Icosahedron", true)));

        assert!(scene.drain_events().is_empty());
        assert_eq!(1, scene.graph().borrow().len());
    }

    #[test]
    fn loaded_meshes_receive_shadows_and_recolor() {
        let (mut scene, _, requests) = initialized();
        scene.on_asset_loaded(
            id_of(&requests, NavbarAsset::Icosahedron),
            Ok(model("navbar_ico", "Icosahedron", false)),
        );

        scene.set_current_color("#FF0000");
        assert_eq!("#ff0000", scene.current_color());

        let graph = scene.graph().borrow();
        let mesh = graph
            .get(graph.find_by_name("Icosahedron").unwrap())
            .unwrap()
            .mesh()
            .unwrap();
        assert!(mesh.cast_shadow && mesh.receive_shadow);
        assert_eq!(Color::from_hex(0xff0000), mesh.material.color);
    }

    #[test]
    fn invalid_color_keeps_the_current_one() {
        let mut scene = NavbarScene::new(LightRegistry::new_shared(), NavbarConfig::default());

        scene.set_current_color("blue-ish");

        assert_eq!(DEFAULT_ACCENT, scene.current_color());
        assert_eq!(1, scene.drain_events().len());
    }

    #[test]
    fn mouse_target_collapses_when_shrunk() {
        let mut scene = NavbarScene::new(LightRegistry::new_shared(), NavbarConfig::default());

        scene.update_mouse_position(1.0, -0.5);
        assert_eq!(Vec2::new(-0.05, 0.2), scene.target_rotation());

        scene.set_shrunk(true);
        scene.update_mouse_position(1.0, 1.0);
        assert_eq!(Vec2::ZERO, scene.target_rotation());
    }

    #[test]
    fn rotation_eases_toward_the_mouse() {
        let (mut scene, renderer, _) = initialized();
        let start = SystemTime::now();
        scene.update_mouse_position(1.0, 0.0);

        let mut previous = 0.0;
        for frame in 0..10 {
            assert!(scene.tick(start + Duration::from_millis(frame * 20)));

            let graph = scene.graph().borrow();
            let rotation_y = graph.get(scene.pivot().unwrap()).unwrap().transform.rotation.y;
            assert!(rotation_y > previous && rotation_y < 0.2);
            previous = rotation_y;
        }

        assert_eq!(10, renderer.borrow().frames_rendered());
    }

    #[test]
    fn config_sets_rate_and_smoothing() {
        let config = NavbarConfig::default().with_fps(30, 12).with_smoothing(1.0);
        let mut scene = NavbarScene::new(LightRegistry::new_shared(), config);
        assert_eq!(Duration::from_secs_f64(1.0 / 30.0), scene.core().frame_interval());

        scene.init(headless().1, viewport());
        scene.update_mouse_position(1.0, 0.0);
        assert!(scene.tick(SystemTime::now()));

        let graph = scene.graph().borrow();
        let rotation_y = graph.get(scene.pivot().unwrap()).unwrap().transform.rotation.y;
        assert!((rotation_y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn shrunk_pivot_settles_flat() {
        let (mut scene, _, _) = initialized();
        let start = SystemTime::now();
        scene.update_mouse_position(1.0, 1.0);

        for frame in 0..30 {
            scene.tick(start + Duration::from_millis(frame * 20));
        }

        scene.set_shrunk(true);
        for frame in 30..300 {
            scene.tick(start + Duration::from_millis(frame * 20));
        }

        let graph = scene.graph().borrow();
        let transform = graph.get(scene.pivot().unwrap()).unwrap().transform;
        assert!(transform.rotation.length() < 1e-3);
        assert!(transform.position.y.abs() < 1e-3);
    }

    #[test]
    fn low_quality_uses_cheaper_renderer_options() {
        let mut scene = NavbarScene::new(LightRegistry::new_shared(), NavbarConfig::default());
        assert!(scene.renderer_options().antialias);

        scene.set_low_quality_mode(true);

        let options = scene.renderer_options();
        assert!(!options.antialias);
        assert_eq!(PowerPreference::LowPower, options.power_preference);
        assert_eq!(Duration::from_secs_f64(1.0 / 24.0), scene.core().frame_interval());
    }

    #[test]
    fn dispose_is_safe_twice_and_before_init() {
        let mut fresh = NavbarScene::new(LightRegistry::new_shared(), NavbarConfig::default());
        fresh.dispose();
        fresh.dispose();
        assert_eq!(SceneState::Disposed, fresh.state());

        let (mut scene, renderer, requests) = initialized();
        scene.on_asset_loaded(
            id_of(&requests, NavbarAsset::Icosahedron),
            Ok(model("navbar_ico", "Icosahedron", true)),
        );
        let mesh_count = scene.graph().borrow().meshes().len();

        scene.dispose();
        scene.dispose();

        assert!(renderer.borrow().is_disposed());
        assert_eq!(mesh_count, renderer.borrow().released_meshes().len());
        assert_eq!(0, scene.core().animation().mixer_count());
        assert!(scene.core().registry().borrow().all_lights().is_empty());
        assert!(!scene.tick(SystemTime::now()));
    }
}
