//! The two decorative scenes of the page and the lifecycle they share.
mod background;
mod lifecycle;
mod navbar;

pub use background::{BackgroundConfig, BackgroundScene};
pub use lifecycle::{FrameThrottle, FrameTime, SceneCore, SceneState, ShadowRefreshTimer};
pub use navbar::{NavbarAsset, NavbarConfig, NavbarScene, AMBIENT_LIGHT_NAME, DIRECTIONAL_LIGHT_NAME};

use crate::{
    content::{AssetRequest, LoadedAsset},
    events::SceneEvent,
    light_registry::SharedScene,
    platform::SystemTime,
    renderer::{RendererOptions, SharedRenderer, Viewport},
};

/// A scene driven by the host: initialized with a renderer, fed input and
/// asset completions, ticked once per display frame and finally disposed.
pub trait DecorativeScene {
    fn core(&self) -> &SceneCore;

    fn core_mut(&mut self) -> &mut SceneCore;

    /// Options the host should create this scene's renderer with.
    fn renderer_options(&self) -> RendererOptions;

    /// Build the scene and start rendering with `renderer`. Only the first
    /// call on an uninitialized scene has any effect.
    fn init(&mut self, renderer: SharedRenderer, viewport: Viewport);

    /// Complete the asset request `id`. Failures are recorded and the asset
    /// is treated as absent.
    fn on_asset_loaded(&mut self, id: u64, result: anyhow::Result<LoadedAsset>);

    /// Mouse position normalized to [-1, 1] on both axes.
    fn update_mouse_position(&mut self, x: f32, y: f32);

    fn set_low_quality_mode(&mut self, low_quality: bool);

    fn is_low_quality(&self) -> bool;

    /// Render a frame if one is due at `now`. Returns true if a frame was
    /// rendered.
    fn tick(&mut self, now: SystemTime) -> bool;

    fn state(&self) -> SceneState {
        self.core().state()
    }

    fn graph(&self) -> &SharedScene {
        self.core().graph()
    }

    fn take_asset_requests(&mut self) -> Vec<AssetRequest> {
        self.core_mut().take_asset_requests()
    }

    fn on_resize(&mut self, viewport: Viewport) {
        self.core_mut().on_resize(viewport)
    }

    fn dispose(&mut self) {
        self.core_mut().dispose()
    }

    fn drain_events(&mut self) -> Vec<SceneEvent> {
        self.core_mut().drain_events()
    }
}
