use tracing::info;
use winit::{dpi::PhysicalSize, window::Window};

/// Id of the page element the scene canvases are appended to.
const CONTAINER_ID: &str = "vitrine-container";

pub fn logging_init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
}

/// Append `window`'s canvas to the page container. Pages without the container
/// get the canvas appended to the body instead.
pub fn create_canvas(window: &Window, width: u32, height: u32) {
    // Winit prevents sizing with CSS so the size has to be manually specified.
    info!("requesting canvas size of {width} x {height}");
    let _ = window.request_inner_size(PhysicalSize::new(width, height));

    use winit::platform::web::WindowExtWebSys;
    let Some(canvas) = window.canvas() else {
        tracing::error!("window has no canvas");
        return;
    };

    let appended = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.get_element_by_id(CONTAINER_ID).or_else(|| d.body().map(Into::into)))
        .and_then(|parent| parent.append_child(&web_sys::Element::from(canvas)).ok());

    if appended.is_none() {
        tracing::error!("failed to append canvas to the document");
    }
}
