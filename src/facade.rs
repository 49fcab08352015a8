//! Single entry point for hosts: owns both scenes and the light registry they
//! share, and routes page events and light panel edits to them.
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    content::{AssetRequest, LoadedAsset},
    events::SceneEvent,
    light_registry::{LightRegistry, SceneTag, ShadowQuality, SharedLightRegistry, SimpleLight},
    platform::SystemTime,
    renderer::{RendererOptions, SharedRenderer, Viewport},
    scenes::{BackgroundConfig, BackgroundScene, DecorativeScene, NavbarConfig, NavbarScene, SceneState},
};

/// Scroll offset past which the navbar collapses.
pub const NAVBAR_SHRINK_SCROLL: f32 = 50.0;

/// A light panel edit, as sent by a UI over JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum LightCommand {
    #[serde(rename_all = "camelCase")]
    SetIntensity { name: String, intensity: f32 },
    #[serde(rename_all = "camelCase")]
    SetColor { name: String, color: String },
    #[serde(rename_all = "camelCase")]
    SetVisibility { name: String, enabled: bool },
    #[serde(rename_all = "camelCase")]
    SetCastShadow { name: String, cast_shadow: bool },
    #[serde(rename_all = "camelCase")]
    SetPosition { name: String, position: Vec3 },
    #[serde(rename_all = "camelCase")]
    SetShadowQuality { quality: ShadowQuality },
}

pub struct SceneFacade {
    registry: SharedLightRegistry,
    navbar_config: NavbarConfig,
    background_config: BackgroundConfig,
    navbar: NavbarScene,
    background: BackgroundScene,
    /// Which scene's lights the light panel lists.
    active_tab: SceneTag,
    low_quality: bool,
}

impl SceneFacade {
    pub fn new(navbar_config: NavbarConfig, background_config: BackgroundConfig) -> Self {
        let registry = LightRegistry::new_shared();

        Self {
            navbar: NavbarScene::new(registry.clone(), navbar_config.clone()),
            background: BackgroundScene::new(registry.clone(), background_config.clone()),
            registry,
            navbar_config,
            background_config,
            active_tab: SceneTag::Navbar,
            low_quality: false,
        }
    }

    pub fn registry(&self) -> &SharedLightRegistry {
        &self.registry
    }

    pub fn navbar(&self) -> &NavbarScene {
        &self.navbar
    }

    pub fn background(&self) -> &BackgroundScene {
        &self.background
    }

    pub fn scene(&self, tag: SceneTag) -> &dyn DecorativeScene {
        match tag {
            SceneTag::Navbar => &self.navbar,
            SceneTag::Background => &self.background,
        }
    }

    pub fn scene_mut(&mut self, tag: SceneTag) -> &mut dyn DecorativeScene {
        match tag {
            SceneTag::Navbar => &mut self.navbar,
            SceneTag::Background => &mut self.background,
        }
    }

    pub fn renderer_options(&self, tag: SceneTag) -> RendererOptions {
        self.scene(tag).renderer_options()
    }

    /// Initialize the navbar scene. A disposed navbar is rebuilt first so the
    /// page can bring it back.
    pub fn init_navbar(&mut self, renderer: SharedRenderer, viewport: Viewport) {
        if self.navbar.state() == SceneState::Disposed {
            let shrunk = self.navbar.is_shrunk();
            let color = self.navbar.current_color().to_string();

            self.navbar = NavbarScene::new(self.registry.clone(), self.navbar_config.clone());
            self.navbar.set_low_quality_mode(self.low_quality);
            self.navbar.set_shrunk(shrunk);
            self.navbar.set_current_color(&color);
        }

        self.navbar.init(renderer, viewport);
    }

    /// Initialize the background scene, rebuilding it first if it was
    /// disposed. The scroll position carries over.
    pub fn init_background(&mut self, renderer: SharedRenderer, viewport: Viewport) {
        if self.background.state() == SceneState::Disposed {
            let scroll = self.background.scroll_position();

            self.background = BackgroundScene::new(self.registry.clone(), self.background_config.clone());
            self.background.set_low_quality_mode(self.low_quality);
            self.background.update_scroll_position(scroll);
        }

        self.background.init(renderer, viewport);
    }

    pub fn on_resize(&mut self, viewport: Viewport) {
        self.navbar.on_resize(viewport);
        self.background.on_resize(viewport);
    }

    pub fn dispose(&mut self) {
        self.navbar.dispose();
        self.background.dispose();
    }

    pub fn current_color(&self) -> &str {
        self.navbar.current_color()
    }

    pub fn set_current_color(&mut self, hex: &str) {
        self.navbar.set_current_color(hex);
    }

    pub fn update_mouse_position(&mut self, x: f32, y: f32) {
        self.navbar.update_mouse_position(x, y);
        self.background.update_mouse_position(x, y);
    }

    /// Feed the page scroll offset to the background and collapse the navbar
    /// once the page is scrolled past `NAVBAR_SHRINK_SCROLL`.
    pub fn update_scroll_position(&mut self, y: f32) {
        self.background.update_scroll_position(y);

        let shrunk = y > NAVBAR_SHRINK_SCROLL;
        if shrunk != self.navbar.is_shrunk() {
            self.navbar.set_shrunk(shrunk);
        }
    }

    pub fn set_low_quality_mode(&mut self, low_quality: bool) {
        info!(low_quality, "switching quality mode");
        self.low_quality = low_quality;
        self.navbar.set_low_quality_mode(low_quality);
        self.background.set_low_quality_mode(low_quality);
    }

    pub fn is_low_quality(&self) -> bool {
        self.low_quality
    }

    pub fn set_navbar_shrunk(&mut self, shrunk: bool) {
        self.navbar.set_shrunk(shrunk);
    }

    /// Tick both scenes. Returns which of (navbar, background) rendered.
    pub fn tick(&mut self, now: SystemTime) -> (bool, bool) {
        (self.navbar.tick(now), self.background.tick(now))
    }

    /// Asset requests issued since the last call, tagged with the scene that
    /// issued them.
    pub fn take_asset_requests(&mut self) -> Vec<(SceneTag, AssetRequest)> {
        SceneTag::ALL
            .into_iter()
            .flat_map(|tag| {
                self.scene_mut(tag)
                    .take_asset_requests()
                    .into_iter()
                    .map(move |request| (tag, request))
            })
            .collect()
    }

    pub fn on_asset_loaded(&mut self, tag: SceneTag, id: u64, result: anyhow::Result<LoadedAsset>) {
        self.scene_mut(tag).on_asset_loaded(id, result);
    }

    /// Recovered failures from both scenes and the registry, in that order.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        let mut events = self.navbar.drain_events();
        events.extend(self.background.drain_events());
        events.extend(self.registry.borrow_mut().drain_events());
        events
    }

    pub fn active_tab(&self) -> SceneTag {
        self.active_tab
    }

    pub fn set_active_tab(&mut self, tab: SceneTag) {
        self.active_tab = tab;
    }

    pub fn all_lights(&self) -> Vec<SimpleLight> {
        self.registry.borrow().all_lights().to_vec()
    }

    pub fn lights_for_active_tab(&self) -> Vec<SimpleLight> {
        self.registry.borrow().lights_by_scene(self.active_tab)
    }

    pub fn lights_for_active_tab_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.lights_for_active_tab())
    }

    pub fn refresh_lights(&mut self) {
        self.registry.borrow_mut().refresh_lights(None);
    }

    pub fn set_light_intensity(&mut self, name: &str, intensity: f32) {
        self.registry.borrow_mut().set_light_intensity(name, intensity);
    }

    pub fn set_light_color(&mut self, name: &str, hex: &str) {
        self.registry.borrow_mut().set_light_color(name, hex);
    }

    pub fn set_light_visibility(&mut self, name: &str, visible: bool) {
        self.registry.borrow_mut().set_light_visibility(name, visible);
    }

    pub fn set_light_cast_shadow(&mut self, name: &str, cast_shadow: bool) {
        self.registry.borrow_mut().set_light_cast_shadow(name, cast_shadow);
    }

    pub fn set_light_position(&mut self, name: &str, position: Vec3) {
        self.registry.borrow_mut().set_light_position(name, position);
    }

    pub fn configure_shadow_quality(&mut self, quality: ShadowQuality) {
        self.registry.borrow_mut().configure_shadow_quality(quality, None);
    }

    pub fn force_update_shadows(&mut self) {
        self.registry.borrow_mut().force_update_shadows(None);
    }

    pub fn apply_light_command(&mut self, command: LightCommand) {
        match command {
            LightCommand::SetIntensity { name, intensity } => self.set_light_intensity(&name, intensity),
            LightCommand::SetColor { name, color } => self.set_light_color(&name, &color),
            LightCommand::SetVisibility { name, enabled } => self.set_light_visibility(&name, enabled),
            LightCommand::SetCastShadow { name, cast_shadow } => {
                self.set_light_cast_shadow(&name, cast_shadow)
            }
            LightCommand::SetPosition { name, position } => self.set_light_position(&name, position),
            LightCommand::SetShadowQuality { quality } => self.configure_shadow_quality(quality),
        }
    }

    /// Parse and apply a `LightCommand` sent as JSON.
    pub fn apply_light_command_json(&mut self, json: &str) -> serde_json::Result<()> {
        let command = serde_json::from_str(json)?;
        self.apply_light_command(command);
        Ok(())
    }
}

impl Default for SceneFacade {
    fn default() -> Self {
        Self::new(NavbarConfig::default(), BackgroundConfig::default())
    }
}
