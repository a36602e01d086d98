use anyhow::{anyhow, Result};
use std::future::Future;
use wasm_bindgen::closure::{Closure, WasmClosure, WasmClosureFnOnce};
use wasm_bindgen::JsCast;
#[rustfmt::skip]
use web_sys::{
    CanvasRenderingContext2d,
    Document,
    HtmlCanvasElement,
    HtmlElement,
    HtmlImageElement,
    Window,
};

macro_rules! log {
    ($($t:tt)*) => {
        web_sys::console::log_1(&format!($($t)*).into());
    }
}

// ==================== Constants ====================
// Constants related to HTML elements
mod html {
    pub const CANVAS_ID: &str = "gameCanvas";
    pub const START_BUTTON_ID: &str = "startButton";
    pub const RESTART_BUTTON_ID: &str = "restartButton";
    pub const CONTEXT_2D: &str = "2d";
}

// Canvas is sized to fill the window width at 16:9, capped by window height.
const ASPECT_RATIO: f64 = 16.0 / 9.0;

pub fn new_image() -> Result<HtmlImageElement> {
    HtmlImageElement::new()
        .map_err(|err| anyhow!("Could not create image element : {:#?}", err))
}

pub fn context() -> Result<CanvasRenderingContext2d> {
    canvas()?
        .get_context(html::CONTEXT_2D)
        .map_err(|js_value| anyhow!("Error getting context : {:#?}", js_value))?
        .ok_or_else(|| anyhow!("No 2d context found"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|element| {
            anyhow!(
                "Error converting {:#?} to CanvasRenderingContext2d",
                element
            )
        })
}

pub fn canvas() -> Result<HtmlCanvasElement> {
    document()?
        .get_element_by_id(html::CANVAS_ID)
        .ok_or_else(|| anyhow!("No Canvas Element found with ID : '{:#?}'", html::CANVAS_ID))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlCanvasElement", element))
}

pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| anyhow!("Window not found"))
}

pub fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| anyhow!("No Document Found"))
}

pub fn start_button() -> Result<HtmlElement> {
    html_element_by_id(html::START_BUTTON_ID)
}

pub fn restart_button() -> Result<HtmlElement> {
    html_element_by_id(html::RESTART_BUTTON_ID)
}

fn html_element_by_id(id: &str) -> Result<HtmlElement> {
    document()?
        .get_element_by_id(id)
        .ok_or_else(|| anyhow!("No element found with ID : '{:#?}'", id))?
        .dyn_into::<HtmlElement>()
        .map_err(|element| anyhow!("Error converting {:#?} to HtmlElement", element))
}

pub fn show_element(element: &HtmlElement) -> Result<()> {
    set_display(element, "block")
}

pub fn hide_element(element: &HtmlElement) -> Result<()> {
    set_display(element, "none")
}

fn set_display(element: &HtmlElement, value: &str) -> Result<()> {
    element
        .style()
        .set_property("display", value)
        .map_err(|err| anyhow!("Error setting display on element : {:#?}", err))
}

/// Resize the canvas to fill the window width at a 16:9 aspect ratio,
/// falling back to height-first when the window is too short.
pub fn fit_canvas_to_window() -> Result<()> {
    let window = window()?;
    let canvas = canvas()?;

    let inner_width = window
        .inner_width()
        .map_err(|err| anyhow!("Error reading innerWidth : {:#?}", err))?
        .as_f64()
        .ok_or_else(|| anyhow!("innerWidth was not a number"))?;
    let inner_height = window
        .inner_height()
        .map_err(|err| anyhow!("Error reading innerHeight : {:#?}", err))?
        .as_f64()
        .ok_or_else(|| anyhow!("innerHeight was not a number"))?;

    let mut width = inner_width;
    let mut height = inner_width / ASPECT_RATIO;
    if height > inner_height {
        height = inner_height;
        width = height * ASPECT_RATIO;
    }

    canvas.set_width(width as u32);
    canvas.set_height(height as u32);
    Ok(())
}

/// Fit the canvas now and keep refitting on every window resize.
pub fn install_resize_handler() -> Result<()> {
    fit_canvas_to_window()?;
    let on_resize = closure_wrap(Box::new(|| {
        if let Err(err) = fit_canvas_to_window() {
            log!("Error resizing canvas : {:#?}", err);
        }
    }) as Box<dyn FnMut()>);
    window()?
        .add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Error attaching resize listener : {:#?}", err))?;
    // listener lives for the page's lifetime
    on_resize.forget();
    Ok(())
}

// The frame callback receives the performance.now() timestamp of the frame.
pub type LoopClosure = Closure<dyn FnMut(f64)>;

pub fn request_animation_frame(callback: &LoopClosure) -> Result<i32> {
    window()?
        .request_animation_frame(callback.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Cannot request animation frame : {:#?}", err))
}

pub fn create_raf_closure(f: impl FnMut(f64) + 'static) -> LoopClosure {
    closure_wrap(Box::new(f))
}

pub fn now() -> Result<f64> {
    Ok(window()?
        .performance()
        .ok_or_else(|| anyhow!("Performance object not found"))?
        .now())
}

/// RAII handle for a `setInterval` timer; dropping the handle clears the
/// interval, so re-arming a spawner cannot leak the previous timer.
pub struct Interval {
    id: i32,
    _callback: Closure<dyn FnMut()>,
}

impl Interval {
    pub fn new(f: impl FnMut() + 'static, period_ms: i32) -> Result<Self> {
        let callback = closure_wrap(Box::new(f) as Box<dyn FnMut()>);
        let id = window()?
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                period_ms,
            )
            .map_err(|err| anyhow!("Cannot set interval : {:#?}", err))?;
        Ok(Interval {
            id,
            _callback: callback,
        })
    }
}

impl Drop for Interval {
    fn drop(&mut self) {
        if let Ok(window) = window() {
            window.clear_interval_with_handle(self.id);
        }
    }
}

pub fn closure_once<F, T, A, R>(f: F) -> Closure<T>
where
    T: ?Sized + WasmClosure,
    F: 'static + WasmClosureFnOnce<T, A, R> + wasm_bindgen::__rt::marker::MaybeUnwindSafe,
{
    Closure::once(f)
}

pub fn closure_wrap<T: WasmClosure + ?Sized>(data: Box<T>) -> Closure<T> {
    Closure::wrap(data)
}

pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}
