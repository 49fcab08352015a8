use std::{collections::HashMap, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    animation::AnimationDriver,
    camera::Camera,
    content::AssetRequest,
    events::{EventQueue, SceneEvent},
    light_registry::{configure_shadows_for_light, SceneTag, SharedLightRegistry, SharedScene},
    lighting::LightKind,
    platform::SystemTime,
    renderer::{apply_options, RenderError, RendererOptions, SharedRenderer, Viewport},
    scene_graph::{NodeDesc, NodeId, SceneGraph},
};

/// Lifecycle of a scene instance.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SceneState {
    #[default]
    Uninitialized,
    /// Rendering with whatever has loaded so far while asset requests are
    /// outstanding.
    Initializing,
    Active,
    Disposed,
}

/// Limits rendering to a target frame rate.
///
/// Time is measured from an arbitrary origin. A frame is due once more than
/// one interval has passed since the last rendered frame; the time past the
/// interval is carried over so the average rate stays on target.
#[derive(Clone, Debug)]
pub struct FrameThrottle {
    interval: Duration,
    last: Option<Duration>,
}

impl FrameThrottle {
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Self::interval_for(fps),
            last: None,
        }
    }

    fn interval_for(fps: u32) -> Duration {
        Duration::from_secs_f64(1.0 / fps.max(1) as f64)
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.interval = Self::interval_for(fps);
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true if a frame should be rendered at `now`. The first call
    /// always renders.
    pub fn should_render(&mut self, now: Duration) -> bool {
        let Some(last) = self.last else {
            self.last = Some(now);
            return true;
        };

        let diff = now.saturating_sub(last);

        if diff <= self.interval {
            return false;
        }

        let remainder = diff.as_nanos() % self.interval.as_nanos().max(1);
        self.last = Some(now.saturating_sub(Duration::from_nanos(remainder as u64)));

        true
    }
}

/// Fires once every `interval`, independently of the frame throttle.
#[derive(Clone, Debug)]
pub struct ShadowRefreshTimer {
    interval: Duration,
    last: Option<Duration>,
}

impl ShadowRefreshTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns true when a refresh is due at `now`. The first call only starts
    /// the timer.
    pub fn is_due(&mut self, now: Duration) -> bool {
        match self.last {
            None => {
                self.last = Some(now);
                false
            }
            Some(last) if now.saturating_sub(last) >= self.interval => {
                self.last = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

/// Timing of a frame that passed the throttle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameTime {
    /// Time since the scene's first tick.
    pub elapsed: Duration,
    /// Time since the previous rendered frame.
    pub delta: Duration,
}

/// Everything the navbar and background scenes have in common: the graph,
/// camera and renderer, registry membership, asset requests, frame pacing and
/// teardown.
pub struct SceneCore {
    tag: SceneTag,
    state: SceneState,
    graph: SharedScene,
    pub(super) camera: Option<Camera>,
    renderer: Option<SharedRenderer>,
    options: RendererOptions,
    registry: SharedLightRegistry,
    pub(super) animation: AnimationDriver,
    events: EventQueue,
    throttle: FrameThrottle,
    shadow_refresh: ShadowRefreshTimer,
    origin: Option<SystemTime>,
    last_frame: Option<Duration>,
    viewport: Option<Viewport>,
    next_request_id: u64,
    pending: HashMap<u64, String>,
    requests: Vec<AssetRequest>,
}

impl SceneCore {
    pub fn new(
        tag: SceneTag,
        registry: SharedLightRegistry,
        fps: u32,
        shadow_refresh_interval: Duration,
    ) -> Self {
        Self {
            tag,
            state: SceneState::Uninitialized,
            graph: SharedScene::default(),
            camera: None,
            renderer: None,
            options: RendererOptions::default(),
            registry,
            animation: AnimationDriver::new(),
            events: EventQueue::default(),
            throttle: FrameThrottle::new(fps),
            shadow_refresh: ShadowRefreshTimer::new(shadow_refresh_interval),
            origin: None,
            last_frame: None,
            viewport: None,
            next_request_id: 0,
            pending: HashMap::new(),
            requests: Vec::new(),
        }
    }

    pub fn tag(&self) -> SceneTag {
        self.tag
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn graph(&self) -> &SharedScene {
        &self.graph
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn renderer(&self) -> Option<&SharedRenderer> {
        self.renderer.as_ref()
    }

    pub fn registry(&self) -> &SharedLightRegistry {
        &self.registry
    }

    pub fn animation(&self) -> &AnimationDriver {
        &self.animation
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.throttle.set_fps(fps);
    }

    pub fn frame_interval(&self) -> Duration {
        self.throttle.interval()
    }

    pub fn push_event(&mut self, event: SceneEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.events.drain()
    }

    /// Take ownership of `renderer`, configure it and join the light registry.
    /// Returns false, leaving everything untouched, unless the scene is
    /// uninitialized.
    pub fn init_common(
        &mut self,
        renderer: SharedRenderer,
        viewport: Viewport,
        options: RendererOptions,
        camera: Camera,
    ) -> bool {
        if self.state != SceneState::Uninitialized {
            warn!(tag = %self.tag, state = ?self.state, "ignoring init of an initialized scene");
            return false;
        }

        apply_options(&mut *renderer.borrow_mut(), &options, viewport);
        self.registry
            .borrow_mut()
            .register_scene(&self.graph, self.tag, Some(renderer.clone()));

        self.renderer = Some(renderer);
        self.camera = Some(camera);
        self.options = options;
        self.viewport = Some(viewport);
        self.state = SceneState::Initializing;

        true
    }

    /// Rebuild this scene's light records so new or renamed lights show up.
    pub fn refresh_lights(&self) {
        self.registry
            .borrow_mut()
            .refresh_lights(Some(&[self.graph.clone()]));
    }

    /// Queue an asset load for the host. Returns the request id.
    pub fn request_asset(&mut self, path: &str) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;

        self.pending.insert(id, path.to_string());
        self.requests.push(AssetRequest {
            id,
            path: path.to_string(),
        });

        id
    }

    pub fn take_asset_requests(&mut self) -> Vec<AssetRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Mark request `id` complete and return its path. Completions for
    /// unknown requests are reported, and completions arriving after dispose
    /// are dropped.
    pub fn complete_request(&mut self, id: u64) -> Option<String> {
        if self.state == SceneState::Disposed {
            debug!(tag = %self.tag, id, "dropping asset completion for a disposed scene");
            return None;
        }

        match self.pending.remove(&id) {
            Some(path) => Some(path),
            None => {
                self.events.push(SceneEvent::UnexpectedAsset { id });
                None
            }
        }
    }

    pub fn record_load_failure(&mut self, path: &str, error: &anyhow::Error) {
        self.events.push(SceneEvent::AssetLoadFailed {
            path: path.to_string(),
            error: format!("{error:#}"),
        });
    }

    /// Move from `Initializing` to `Active` once no requests are outstanding.
    pub fn settle_if_loaded(&mut self) {
        if self.state == SceneState::Initializing && self.pending.is_empty() {
            info!(tag = %self.tag, "scene is active");
            self.state = SceneState::Active;
        }
    }

    /// Attach a loaded subtree under `parent`, turn on shadows for its meshes
    /// and shadow capable lights, then register its lights and invalidate the
    /// shadow maps it now affects.
    pub fn merge_asset(&mut self, parent: NodeId, desc: NodeDesc) -> Option<NodeId> {
        let scene = self.graph.clone();
        let node = {
            let mut graph = scene.borrow_mut();
            let node = graph.attach(parent, desc)?;

            graph.configure_shadows_for_object(node, true, true);
            self.configure_imported_lights(&mut graph, node);

            node
        };

        self.refresh_lights();
        self.registry
            .borrow_mut()
            .force_update_shadows(Some(&[self.graph.clone()]));

        Some(node)
    }

    fn configure_imported_lights(&mut self, graph: &mut SceneGraph, subtree: NodeId) {
        for id in graph.lights_in_subtree(subtree) {
            let Some(node) = graph.get_mut(id) else {
                continue;
            };
            let name = node.name.clone();
            let Some(light) = node.light_mut() else {
                continue;
            };

            if !matches!(light.kind, LightKind::Directional | LightKind::Spot) {
                continue;
            }

            light.cast_shadow = true;

            if let Err(error) = configure_shadows_for_light(light) {
                self.events
                    .push(SceneEvent::ShadowCameraUpdateFailed { light: name, error });
            }
        }
    }

    /// Apply a new viewport to the camera and renderer. Safe before init, in
    /// which case the viewport is only remembered.
    pub fn on_resize(&mut self, viewport: Viewport) {
        if self.state == SceneState::Disposed {
            return;
        }

        if viewport.width == 0 || viewport.height == 0 {
            self.events.push(SceneEvent::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
            });
            return;
        }

        self.viewport = Some(viewport);

        if let Some(camera) = self.camera.as_mut() {
            if let Err(error) = camera.set_viewport_size(viewport.width, viewport.height) {
                warn!(%error, "camera rejected viewport");
            }
        }

        if let Some(renderer) = &self.renderer {
            let mut renderer = renderer.borrow_mut();
            renderer.set_size(viewport.width, viewport.height);
            renderer.set_pixel_ratio(self.options.resolve_pixel_ratio(viewport.device_pixel_ratio));
        }
    }

    /// Start a frame at `now` if the scene is running and the throttle allows
    /// it.
    pub fn begin_frame(&mut self, now: SystemTime) -> Option<FrameTime> {
        if !matches!(self.state, SceneState::Initializing | SceneState::Active) {
            return None;
        }

        let origin = *self.origin.get_or_insert(now);
        let elapsed = now.saturating_duration_since(origin);

        if !self.throttle.should_render(elapsed) {
            return None;
        }

        let delta = elapsed.saturating_sub(self.last_frame.unwrap_or(elapsed));
        self.last_frame = Some(elapsed);

        Some(FrameTime { elapsed, delta })
    }

    /// Advance animations, refresh shadows when due and draw the frame.
    pub fn finish_frame(&mut self, frame: FrameTime) {
        self.animation
            .update(Some(frame.delta), &mut self.graph.borrow_mut());

        if self.shadow_refresh.is_due(frame.elapsed) {
            debug!(tag = %self.tag, "periodic shadow refresh");
            self.registry
                .borrow_mut()
                .force_update_shadows(Some(&[self.graph.clone()]));
        }

        let (Some(renderer), Some(camera)) = (&self.renderer, &self.camera) else {
            return;
        };

        let result = renderer
            .borrow_mut()
            .render(&mut self.graph.borrow_mut(), camera);

        match result {
            Ok(()) => {}
            Err(RenderError::Disposed) => debug!(tag = %self.tag, "renderer already disposed"),
            Err(error) => warn!(tag = %self.tag, %error, "skipped frame"),
        }
    }

    /// Tear the scene down: stop animations, release every mesh and the
    /// renderer, empty the graph and leave the registry. Safe to call more
    /// than once and before `init_common`.
    pub fn dispose(&mut self) {
        if self.state == SceneState::Disposed {
            return;
        }

        self.animation.dispose();

        let meshes = self.graph.borrow().meshes();

        if let Some(renderer) = self.renderer.take() {
            let mut renderer = renderer.borrow_mut();
            for id in meshes {
                renderer.release_mesh(id);
            }
            renderer.dispose();
        }

        self.graph.borrow_mut().clear();

        self.registry.borrow_mut().unregister_scene(&self.graph);

        self.camera = None;
        self.pending.clear();
        self.requests.clear();
        self.state = SceneState::Disposed;

        info!(tag = %self.tag, "scene disposed");
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use glam::Vec3;

    use super::*;
    use crate::{
        color::Color,
        light_registry::LightRegistry,
        lighting::Light,
        renderer::HeadlessRenderer,
        scene_graph::NodeKind,
    };

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn started_core(tag: SceneTag, registry: &SharedLightRegistry) -> SceneCore {
        let mut core = SceneCore::new(tag, registry.clone(), 60, Duration::from_secs(5));
        let renderer: SharedRenderer = Rc::new(RefCell::new(HeadlessRenderer::new()));
        let camera = Camera::new(75.0, 0.1, 100.0, Vec3::new(0.0, 0.0, 5.0), 100, 100);

        assert!(core.init_common(renderer, Viewport::new(100, 100, 1.0), RendererOptions::new(), camera));
        core
    }

    #[test]
    fn merged_lights_cast_shadows_and_are_registered() {
        let registry = LightRegistry::new_shared();
        let mut core = started_core(SceneTag::Navbar, &registry);
        let root = core.graph().borrow().root();

        let lamp = NodeDesc::group("lamp")
            .with_child(NodeDesc::new("sun", NodeKind::Light(Light::directional(Color::WHITE, 1.0))));
        let node = core.merge_asset(root, lamp).unwrap();

        let graph = core.graph().borrow();
        let sun = graph.find_by_name("sun").unwrap();
        assert!(graph.lights_in_subtree(node).contains(&sun));
        assert!(graph.get(sun).unwrap().light().unwrap().cast_shadow);
        drop(graph);

        let registry = registry.borrow();
        assert_eq!(Some(true), registry.find("sun", SceneTag::Navbar).unwrap().cast_shadow);
    }

    #[test]
    fn dispose_leaves_other_scenes_lights_alone() {
        let registry = LightRegistry::new_shared();
        let mut navbar = started_core(SceneTag::Navbar, &registry);
        let background = started_core(SceneTag::Background, &registry);

        let lamp = {
            let mut graph = background.graph().borrow_mut();
            let root = graph.root();
            graph.add_child(root, "lamp", NodeKind::Light(Light::point(Color::WHITE, 0.8))).unwrap()
        };
        background.refresh_lights();

        // Animated directly on the node, so the registry record is stale.
        background.graph().borrow_mut().get_mut(lamp).unwrap().light_mut().unwrap().intensity = 0.5;

        navbar.dispose();

        let graph = background.graph().borrow();
        assert_eq!(0.5, graph.get(lamp).unwrap().light().unwrap().intensity);
        assert_eq!(1, registry.borrow().scene_count());
        assert!(registry.borrow().find("lamp", SceneTag::Background).is_some());
    }

    #[test]
    fn throttle_skips_frames_under_the_interval() {
        let mut throttle = FrameThrottle::new(10);

        assert!(throttle.should_render(ms(0)));
        assert!(!throttle.should_render(ms(50)));
        assert!(!throttle.should_render(ms(100)));
        assert!(throttle.should_render(ms(101)));
    }

    #[test]
    fn throttle_carries_the_remainder() {
        let mut throttle = FrameThrottle::new(10);
        throttle.should_render(ms(0));

        // 250ms late: the frame renders and the clock snaps back to 200ms.
        assert!(throttle.should_render(ms(250)));
        assert!(!throttle.should_render(ms(300)));
        assert!(throttle.should_render(ms(301)));
    }

    #[test]
    fn low_quality_rate_renders_fewer_frames() {
        let count = |fps| {
            let mut throttle = FrameThrottle::new(fps);
            (0..1000).filter(|t| throttle.should_render(ms(*t))).count()
        };

        assert!(count(24) < count(60));
        assert!((20..=25).contains(&count(24)));
    }

    #[test]
    fn shadow_refresh_fires_every_interval() {
        let mut timer = ShadowRefreshTimer::new(Duration::from_secs(5));

        assert!(!timer.is_due(ms(0)));
        assert!(!timer.is_due(ms(4_999)));
        assert!(timer.is_due(ms(5_000)));
        assert!(!timer.is_due(ms(6_000)));
        assert!(timer.is_due(ms(10_500)));
    }
}
