pub mod animation;
pub mod camera;
pub mod color;
pub mod content;
pub mod events;
pub mod facade;
pub mod geometry;
pub mod light_registry;
pub mod lighting;
pub mod math_utils;
pub mod platform;
pub mod renderer;
pub mod scene_graph;
pub mod scenes;

#[cfg(target_arch = "wasm32")]
mod wasm_support;

use std::{cell::RefCell, rc::Rc, sync::Arc};

use tracing::{debug, info};
use winit::{
    dpi::PhysicalSize,
    event::*,
    event_loop::{ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowBuilder},
};

use crate::{
    content::LoadedAsset,
    facade::SceneFacade,
    light_registry::SceneTag,
    platform::SystemTime,
    renderer::{GpuRenderer, SharedRenderer, Viewport},
};

const NAVBAR_SIZE: (u32, u32) = (1024, 120);
const BACKGROUND_SIZE: (u32, u32) = (1024, 768);
/// Pixels scrolled per wheel line.
const SCROLL_LINE_HEIGHT: f32 = 40.0;

type Completion = (SceneTag, u64, anyhow::Result<LoadedAsset>);

/// Runs asset requests issued by the scenes and queues their results until the
/// next frame picks them up.
#[derive(Default)]
struct AssetPump {
    completed: Rc<RefCell<Vec<Completion>>>,
}

impl AssetPump {
    fn dispatch(&self, facade: &mut SceneFacade) {
        for (tag, request) in facade.take_asset_requests() {
            info!(%tag, path = %request.path, "loading asset");

            cfg_if::cfg_if! {
                if #[cfg(target_arch = "wasm32")] {
                    let completed = self.completed.clone();
                    wasm_bindgen_futures::spawn_local(async move {
                        let result = content::load_asset(&request.path).await;
                        completed.borrow_mut().push((tag, request.id, result));
                    });
                } else {
                    let result = pollster::block_on(content::load_asset(&request.path));
                    self.completed.borrow_mut().push((tag, request.id, result));
                }
            }
        }
    }

    fn deliver(&self, facade: &mut SceneFacade) {
        let completed = std::mem::take(&mut *self.completed.borrow_mut());

        for (tag, id, result) in completed {
            facade.on_asset_loaded(tag, id, result);
        }
    }
}

fn viewport_of(window: &Window) -> Viewport {
    let size = window.inner_size();
    Viewport::new(size.width, size.height, window.scale_factor() as f32)
}

fn build_window(
    event_loop: &EventLoop<()>,
    title: &str,
    (width, height): (u32, u32),
) -> anyhow::Result<Arc<Window>> {
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(width, height))
        .build(event_loop)?;

    #[cfg(target_arch = "wasm32")]
    wasm_support::create_canvas(&window, width, height);

    Ok(Arc::new(window))
}

async fn create_renderer(
    facade: &SceneFacade,
    tag: SceneTag,
    window: Arc<Window>,
) -> anyhow::Result<SharedRenderer> {
    let renderer = GpuRenderer::new(window, &facade.renderer_options(tag)).await?;
    Ok(Rc::new(RefCell::new(renderer)))
}

/// Open a window per scene and drive both scenes until a window is closed.
pub async fn run() -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let navbar_window = build_window(&event_loop, "vitrine navbar", NAVBAR_SIZE)?;
    let background_window = build_window(&event_loop, "vitrine background", BACKGROUND_SIZE)?;

    let mut facade = SceneFacade::default();

    let renderer = create_renderer(&facade, SceneTag::Navbar, navbar_window.clone()).await?;
    facade.init_navbar(renderer, viewport_of(&navbar_window));

    let renderer = create_renderer(&facade, SceneTag::Background, background_window.clone()).await?;
    facade.init_background(renderer, viewport_of(&background_window));

    let assets = AssetPump::default();
    let mut scroll_y = 0.0_f32;

    info!("starting event loop");

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } => {
            let (tag, window) = if window_id == navbar_window.id() {
                (SceneTag::Navbar, &navbar_window)
            } else if window_id == background_window.id() {
                (SceneTag::Background, &background_window)
            } else {
                return;
            };

            match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            state: ElementState::Pressed,
                            logical_key: Key::Named(NamedKey::Escape),
                            ..
                        },
                    ..
                } => {
                    facade.dispose();
                    elwt.exit();
                }
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            state: ElementState::Pressed,
                            logical_key: Key::Character(c),
                            ..
                        },
                    ..
                } if c.as_str() == "q" => {
                    facade.set_low_quality_mode(!facade.is_low_quality());
                }
                WindowEvent::Resized(size) => {
                    let viewport =
                        Viewport::new(size.width, size.height, window.scale_factor() as f32);
                    facade.scene_mut(tag).on_resize(viewport);
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    facade.scene_mut(tag).on_resize(viewport_of(window));
                }
                WindowEvent::CursorMoved { position, .. } => {
                    let size = window.inner_size();
                    if size.width > 0 && size.height > 0 {
                        let x = (position.x / size.width as f64) * 2.0 - 1.0;
                        let y = -((position.y / size.height as f64) * 2.0 - 1.0);
                        facade.update_mouse_position(x as f32, y as f32);
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    let dy = match delta {
                        MouseScrollDelta::LineDelta(_, lines) => lines * SCROLL_LINE_HEIGHT,
                        MouseScrollDelta::PixelDelta(pixels) => pixels.y as f32,
                    };
                    scroll_y = (scroll_y - dy).max(0.0);
                    facade.update_scroll_position(scroll_y);
                }
                WindowEvent::RedrawRequested => {
                    assets.dispatch(&mut facade);
                    assets.deliver(&mut facade);

                    facade.scene_mut(tag).tick(SystemTime::now());

                    let events = facade.drain_events();
                    if !events.is_empty() {
                        debug!(count = events.len(), "scene events since last frame");
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            navbar_window.request_redraw();
            background_window.request_redraw();
        }
        _ => {}
    })?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use wasm_bindgen::prelude::*;

    #[wasm_bindgen(start)]
    pub fn start() {
        super::wasm_support::logging_init();

        wasm_bindgen_futures::spawn_local(async {
            if let Err(error) = super::run().await {
                tracing::error!("{error:#}");
            }
        });
    }
}
