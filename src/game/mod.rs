pub mod world;

use self::world::{Facing, Phase, World, SPAWN_PERIOD_MS};
use crate::browser;
use crate::engine::{self, Game, KeyState, Point, Rect, Renderer, Size};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedReceiver};
use futures::join;
use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlCanvasElement, HtmlImageElement};

/// ┌──────────────────── Game Architecture Overview ─────────────────────┐
/// │                                                                     │
/// │   engine::GameLoop ──► DodgeTheDrop::update ──► world::World::tick  │
/// │        │                     │                                      │
/// │        │               drains UI clicks and                         │
/// │        │               spawner interval ticks                       │
/// │        │                                                            │
/// │        └──────────────► DodgeTheDrop::draw  ◄── reads World         │
/// │                                                                     │
/// └─────────────────────────────────────────────────────────────────────┘
pub enum DodgeTheDrop {
    /// Initial state while image resources are being loaded
    Loading,

    /// Active game state with loaded assets and a live world
    Loaded(Session),
}

enum UiEvent {
    StartClicked,
    RestartClicked,
}

struct Assets {
    background: HtmlImageElement,
    mid: HtmlImageElement,
    far: HtmlImageElement,
    player: HtmlImageElement,
    drop: HtmlImageElement,
}

/// Everything the wasm side owns for one page lifetime: the simulation
/// world plus the DOM-facing channels and the spawner handle.
pub struct Session {
    world: World,
    assets: Assets,
    canvas: HtmlCanvasElement,
    ui_receiver: UnboundedReceiver<UiEvent>,
    spawner: Option<browser::Interval>,
    spawn_receiver: Option<UnboundedReceiver<()>>,
}

impl DodgeTheDrop {
    const BACKGROUND_PATH: &'static str = "./assets/background.png";
    const MID_PATH: &'static str = "./assets/mid.png";
    const FAR_PATH: &'static str = "./assets/far.png";
    const PLAYER_PATH: &'static str = "./assets/player.png";
    const DROP_PATH: &'static str = "./assets/drop.png";

    pub fn new() -> Self {
        DodgeTheDrop::Loading
    }

    /// Gate the first frame on every image: a failed load fails
    /// initialization instead of degrading to blank draws.
    async fn load_assets() -> Result<Assets> {
        let (background, mid, far, player, drop) = join!(
            engine::load_image(Self::BACKGROUND_PATH),
            engine::load_image(Self::MID_PATH),
            engine::load_image(Self::FAR_PATH),
            engine::load_image(Self::PLAYER_PATH),
            engine::load_image(Self::DROP_PATH),
        );
        Ok(Assets {
            background: background.context("Failed to load background image")?,
            mid: mid.context("Failed to load mid layer image")?,
            far: far.context("Failed to load far layer image")?,
            player: player.context("Failed to load player image")?,
            drop: drop.context("Failed to load drop image")?,
        })
    }
}

impl Default for DodgeTheDrop {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Game for DodgeTheDrop {
    async fn initialize(&self) -> Result<Box<dyn Game>> {
        match self {
            DodgeTheDrop::Loading => {
                let assets = Self::load_assets().await?;
                let ui_receiver = prepare_ui()?;
                let canvas = browser::canvas()?;
                let world = World::new(canvas_size(&canvas));

                // Idle until the player clicks Start
                browser::show_element(&browser::start_button()?)?;
                browser::hide_element(&browser::restart_button()?)?;

                Ok(Box::new(DodgeTheDrop::Loaded(Session {
                    world,
                    assets,
                    canvas,
                    ui_receiver,
                    spawner: None,
                    spawn_receiver: None,
                })))
            }
            DodgeTheDrop::Loaded(_) => Err(anyhow!("Game is already initialized")),
        }
    }

    fn update(&mut self, keystate: &KeyState, now: f64) {
        if let DodgeTheDrop::Loaded(session) = self {
            // ground level and spawn bounds follow the live canvas size
            session.world.set_viewport(canvas_size(&session.canvas));

            while let Ok(Some(event)) = session.ui_receiver.try_next() {
                match event {
                    UiEvent::StartClicked | UiEvent::RestartClicked => session.begin_run(now),
                }
            }

            if let Some(spawn_receiver) = session.spawn_receiver.as_mut() {
                while let Ok(Some(())) = spawn_receiver.try_next() {
                    session.world.spawn_drop(&mut rand::thread_rng());
                }
            }

            let was_running = session.world.phase().is_running();
            session.world.tick(keystate, now);
            if was_running && session.world.phase().is_game_over() {
                session.on_game_over();
            }
        }
    }

    fn draw(&self, renderer: &Renderer) {
        let viewport = renderer.viewport();
        let screen = Rect::from_parts(0.0, 0.0, viewport.width, viewport.height);
        if let DodgeTheDrop::Loaded(session) = self {
            match session.world.phase() {
                Phase::Idle => renderer.clear(&screen),
                Phase::Running => session.draw_scene(renderer, &screen),
                Phase::GameOver => session.draw_game_over(renderer, &screen),
            }
        }
    }
}

impl Session {
    /// Start or restart a run: both buttons hidden, world reset, spawner
    /// re-armed. Assigning the new interval handle drops (and thereby
    /// cancels) any previous one.
    fn begin_run(&mut self, now: f64) {
        if let Err(err) = hide_buttons() {
            log!("Error hiding buttons : {:#?}", err);
        }
        self.world.start(now);
        if let Err(err) = self.arm_spawner() {
            log!("Error arming drop spawner : {:#?}", err);
        }
    }

    fn arm_spawner(&mut self) -> Result<()> {
        let (tx, rx) = unbounded();
        let interval = browser::Interval::new(
            move || {
                let _ = tx.unbounded_send(());
            },
            SPAWN_PERIOD_MS,
        )?;
        self.spawner = Some(interval);
        self.spawn_receiver = Some(rx);
        Ok(())
    }

    fn on_game_over(&mut self) {
        // cancel the spawner; the run clock is already frozen by the world
        self.spawner = None;
        self.spawn_receiver = None;
        if let Err(err) = browser::restart_button().and_then(|button| browser::show_element(&button))
        {
            log!("Error showing restart button : {:#?}", err);
        }
    }

    // Draw order matters : far -> mid -> static background -> player ->
    // drops -> timer overlay
    fn draw_scene(&self, renderer: &Renderer, screen: &Rect) {
        renderer.clear(screen);

        let Size { width, height } = self.world.viewport();
        draw_scroll_layer(renderer, &self.assets.far, self.world.far_layer().offset(), width, height);
        draw_scroll_layer(renderer, &self.assets.mid, self.world.mid_layer().offset(), width, height);
        renderer.draw_entire_image(&self.assets.background, screen);

        let player = self.world.player();
        match player.facing() {
            Facing::Right => renderer.draw_entire_image(&self.assets.player, &player.bounding_box()),
            Facing::Left => {
                renderer.draw_entire_image_flipped(&self.assets.player, &player.bounding_box())
            }
        }

        for drop in self.world.drops() {
            renderer.draw_entire_image(&self.assets.drop, &drop.bounding_box());
        }

        renderer.text(
            &format!("Time: {:.3}s", self.world.score_seconds()),
            &Point { x: 10.0, y: 30.0 },
            "24px Arial",
            "black",
        );
    }

    fn draw_game_over(&self, renderer: &Renderer, screen: &Rect) {
        renderer.clear(screen);
        renderer.text_centered(
            &format!("Game Over! Score: {:.3}s", self.world.score_seconds()),
            &Point {
                x: screen.size.width / 2.0,
                y: screen.size.height / 2.0,
            },
            "48px Arial",
            "red",
        );
    }
}

// Each layer is drawn twice, one viewport width apart; the extra pixel of
// width hides the seam between the copies.
fn draw_scroll_layer(
    renderer: &Renderer,
    image: &HtmlImageElement,
    offset: f32,
    width: f32,
    height: f32,
) {
    let x = offset.floor();
    renderer.draw_entire_image(image, &Rect::from_parts(x, 0.0, width + 1.0, height));
    renderer.draw_entire_image(image, &Rect::from_parts(x + width, 0.0, width + 1.0, height));
}

fn canvas_size(canvas: &HtmlCanvasElement) -> Size {
    Size {
        width: canvas.width() as f32,
        height: canvas.height() as f32,
    }
}

fn hide_buttons() -> Result<()> {
    browser::hide_element(&browser::start_button()?)?;
    browser::hide_element(&browser::restart_button()?)?;
    Ok(())
}

/// Forward Start and Restart clicks into a channel drained once per frame,
/// so all state mutation stays inside the game loop.
fn prepare_ui() -> Result<UnboundedReceiver<UiEvent>> {
    let (tx, rx) = unbounded();
    let restart_tx = tx.clone();

    let onclick_start = browser::closure_wrap(Box::new(move |_: Event| {
        let _ = tx.unbounded_send(UiEvent::StartClicked);
    }) as Box<dyn FnMut(Event)>);
    browser::start_button()?
        .add_event_listener_with_callback("click", onclick_start.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Error attaching start click listener : {:#?}", err))?;
    onclick_start.forget();

    let onclick_restart = browser::closure_wrap(Box::new(move |_: Event| {
        let _ = restart_tx.unbounded_send(UiEvent::RestartClicked);
    }) as Box<dyn FnMut(Event)>);
    browser::restart_button()?
        .add_event_listener_with_callback("click", onclick_restart.as_ref().unchecked_ref())
        .map_err(|err| anyhow!("Error attaching restart click listener : {:#?}", err))?;
    onclick_restart.forget();

    Ok(rx)
}
