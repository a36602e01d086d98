use crate::browser;
use anyhow::{anyhow, Error, Result};
// web assembly is a single threaded environment, so Rc RefCell > Mutex
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::channel::oneshot::channel;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement, KeyboardEvent};

#[async_trait(?Send)]
pub trait Game {
    async fn initialize(&self) -> Result<Box<dyn Game>>;
    fn update(&mut self, keystate: &KeyState, now: f64);
    fn draw(&self, renderer: &Renderer);
}

// length of a simulation tick in milliseconds
const FRAME_SIZE: f32 = 1.0 / 60.0 * 1000.0;

pub struct GameLoop {
    last_frame: f64,
    accumulated_delta: f32,
}

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

impl GameLoop {
    /// Drive `game` with fixed-size ticks accumulated from real elapsed
    /// time, drawing once per animation frame.
    pub async fn start(game: impl Game + 'static) -> Result<()> {
        let mut keyevent_receiver = prepare_input()?;
        let mut keystate = KeyState::new();
        let mut game = game.initialize().await?;
        let mut game_loop = GameLoop {
            last_frame: browser::now()?,
            accumulated_delta: 0.0,
        };
        let renderer = Renderer {
            context: browser::context()?,
            canvas: browser::canvas()?,
        };
        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            process_input(&mut keystate, &mut keyevent_receiver);
            game_loop.accumulated_delta += (perf - game_loop.last_frame) as f32;
            while game_loop.accumulated_delta > FRAME_SIZE {
                game.update(&keystate, perf);
                game_loop.accumulated_delta -= FRAME_SIZE;
            }
            game_loop.last_frame = perf;
            game.draw(&renderer);
            let _ = browser::request_animation_frame(f.borrow().as_ref().unwrap());
        }));

        browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub position: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(position: Point, size: Size) -> Self {
        Rect { position, size }
    }

    pub fn from_parts(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            position: Point { x, y },
            size: Size { width, height },
        }
    }

    pub fn left(&self) -> f32 {
        self.position.x
    }

    pub fn right(&self) -> f32 {
        self.position.x + self.size.width
    }

    pub fn top(&self) -> f32 {
        self.position.y
    }

    pub fn bottom(&self) -> f32 {
        self.position.y + self.size.height
    }

    /// Axis-aligned overlap test; touching edges do not count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }
}

pub struct Renderer {
    context: CanvasRenderingContext2d,
    canvas: HtmlCanvasElement,
}

impl Renderer {
    pub fn viewport(&self) -> Size {
        Size {
            width: self.canvas.width() as f32,
            height: self.canvas.height() as f32,
        }
    }

    pub fn clear(&self, rect: &Rect) {
        self.context.clear_rect(
            rect.position.x.into(),
            rect.position.y.into(),
            rect.size.width.into(),
            rect.size.height.into(),
        );
    }

    /// Draw the whole image scaled into `destination`.
    pub fn draw_entire_image(&self, image: &HtmlImageElement, destination: &Rect) {
        self.context
            .draw_image_with_html_image_element_and_dw_and_dh(
                image,
                destination.position.x.into(),
                destination.position.y.into(),
                destination.size.width.into(),
                destination.size.height.into(),
            )
            .expect("Drawing is throwing exceptions! Unrecoverable error");
    }

    /// Draw the whole image mirrored horizontally about the center of
    /// `destination`.
    pub fn draw_entire_image_flipped(&self, image: &HtmlImageElement, destination: &Rect) {
        self.context.save();
        self.context
            .translate(
                (destination.position.x + destination.size.width / 2.0).into(),
                0.0,
            )
            .expect("Translate is throwing exceptions! Unrecoverable error");
        self.context
            .scale(-1.0, 1.0)
            .expect("Scale is throwing exceptions! Unrecoverable error");
        self.context
            .draw_image_with_html_image_element_and_dw_and_dh(
                image,
                (-destination.size.width / 2.0).into(),
                destination.position.y.into(),
                destination.size.width.into(),
                destination.size.height.into(),
            )
            .expect("Drawing is throwing exceptions! Unrecoverable error");
        self.context.restore();
    }

    pub fn text(&self, text: &str, position: &Point, font: &str, color: &str) {
        self.context.set_font(font);
        self.context.set_fill_style_str(color);
        self.context.set_text_align("left");
        self.context
            .fill_text(text, position.x.into(), position.y.into())
            .expect("Text is throwing exceptions! Unrecoverable error");
    }

    pub fn text_centered(&self, text: &str, position: &Point, font: &str, color: &str) {
        self.context.set_font(font);
        self.context.set_fill_style_str(color);
        self.context.set_text_align("center");
        self.context
            .fill_text(text, position.x.into(), position.y.into())
            .expect("Text is throwing exceptions! Unrecoverable error");
    }
}

enum KeyPress {
    KeyUp(String),
    KeyDown(String),
}

/// Level-triggered key state: a key is pressed from its keydown event until
/// its keyup event, sampled once per frame by the game loop.
#[derive(Debug, Default)]
pub struct KeyState {
    pressed_keys: HashSet<String>,
}

impl KeyState {
    pub fn new() -> Self {
        KeyState {
            pressed_keys: HashSet::new(),
        }
    }

    pub fn is_pressed(&self, code: &str) -> bool {
        self.pressed_keys.contains(code)
    }

    fn set_pressed(&mut self, code: String) {
        self.pressed_keys.insert(code);
    }

    fn set_released(&mut self, code: &str) {
        self.pressed_keys.remove(code);
    }
}

#[cfg(test)]
impl KeyState {
    pub fn with_pressed(codes: &[&str]) -> Self {
        let mut state = KeyState::new();
        for code in codes {
            state.set_pressed((*code).into());
        }
        state
    }
}

fn prepare_input() -> Result<UnboundedReceiver<KeyPress>> {
    let (keydown_sender, keyevent_receiver) = unbounded();
    let keyup_sender = keydown_sender.clone();

    let onkeydown = browser::closure_wrap(Box::new(move |keycode: KeyboardEvent| {
        let _ = keydown_sender.unbounded_send(KeyPress::KeyDown(keycode.code()));
    }) as Box<dyn FnMut(KeyboardEvent)>);
    let onkeyup = browser::closure_wrap(Box::new(move |keycode: KeyboardEvent| {
        let _ = keyup_sender.unbounded_send(KeyPress::KeyUp(keycode.code()));
    }) as Box<dyn FnMut(KeyboardEvent)>);

    let window = browser::window()?;
    window
        .add_event_listener_with_callback("keydown", onkeydown.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Error attaching keydown listener : {:#?}", err))?;
    window
        .add_event_listener_with_callback("keyup", onkeyup.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Error attaching keyup listener : {:#?}", err))?;
    // listeners live for the page's lifetime
    onkeydown.forget();
    onkeyup.forget();

    Ok(keyevent_receiver)
}

fn process_input(state: &mut KeyState, keyevent_receiver: &mut UnboundedReceiver<KeyPress>) {
    loop {
        match keyevent_receiver.try_next() {
            Ok(None) | Err(_) => break,
            Ok(Some(event)) => match event {
                KeyPress::KeyUp(code) => state.set_released(&code),
                KeyPress::KeyDown(code) => state.set_pressed(code),
            },
        }
    }
}

/// Asynchronously load an image from a given source path
/// # Arguments
/// * `source` - string slice to path/url
/// # Returns
/// * `Ok(HtmlImageElement)` - on load success
/// * `Err` - on load fail
pub async fn load_image(source: &str) -> Result<HtmlImageElement> {
    let image = browser::new_image()?;
    let (tx, rx) = channel::<Result<(), Error>>();
    let success_tx = Rc::new(RefCell::new(Some(tx)));
    let error_tx = success_tx.clone();

    let success_callback = browser::closure_once(move || {
        if let Some(tx) = success_tx.borrow_mut().take() {
            let _ = tx.send(Ok(()));
        }
    });

    let error_callback = browser::closure_once(move |err: JsValue| {
        if let Some(tx) = error_tx.borrow_mut().take() {
            let _ = tx.send(Err(anyhow!(
                "[engine.rs::load_image] Error loading image: {:#?}",
                err
            )));
        }
    });

    image.set_onload(Some(success_callback.as_ref().unchecked_ref()));
    image.set_onerror(Some(error_callback.as_ref().unchecked_ref()));
    image.set_src(source);

    // keep callback alive until image is loaded or errors
    success_callback.forget();
    error_callback.forget();

    rx.await??;

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_rects_intersect() {
        let a = Rect::from_parts(0.0, 0.0, 64.0, 128.0);
        let b = Rect::from_parts(32.0, 100.0, 32.0, 32.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn touching_edges_do_not_intersect() {
        let a = Rect::from_parts(0.0, 0.0, 64.0, 128.0);
        let b = Rect::from_parts(64.0, 0.0, 32.0, 32.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn disjoint_rects_do_not_intersect() {
        let a = Rect::from_parts(0.0, 0.0, 64.0, 128.0);
        let b = Rect::from_parts(200.0, 300.0, 32.0, 32.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn key_state_tracks_press_and_release() {
        let mut state = KeyState::new();
        state.set_pressed("ArrowRight".into());
        assert!(state.is_pressed("ArrowRight"));
        assert!(!state.is_pressed("ArrowLeft"));
        state.set_released("ArrowRight");
        assert!(!state.is_pressed("ArrowRight"));
    }
}
