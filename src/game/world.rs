use crate::engine::{KeyState, Point, Rect, Size};
use rand::Rng;

// physics consts
const PLAYER_WIDTH: f32 = 64.0;
const PLAYER_HEIGHT: f32 = 128.0;
const PLAYER_SPEED: f32 = 5.0;
const PLAYER_START_X: f32 = 100.0;
const GRAVITY: f32 = 0.8;
const JUMP_STRENGTH: f32 = 15.0;
// ground level sits this far above the bottom of the viewport
const GROUND_OFFSET: f32 = 350.0;

// background consts
const MID_SPEED: f32 = 0.5;
const FAR_SPEED: f32 = 1.0;

// drop consts
pub const DROP_SIZE: f32 = 32.0;
const DROP_MARGIN: f32 = 50.0;
const DROP_MIN_SPEED: f32 = 2.0;
const DROP_MAX_SPEED: f32 = 4.0;
const MAX_DROPS: usize = 10;
pub const SPAWN_PERIOD_MS: i32 = 2000;

// key bindings
mod keys {
    pub const LEFT: &str = "ArrowLeft";
    pub const RIGHT: &str = "ArrowRight";
    pub const JUMP: &str = "Space";
}

fn ground_level(viewport: Size) -> f32 {
    viewport.height - GROUND_OFFSET
}

/// ┌────────────── Phase Transition Flow ───────────────┐
/// │  From Phase  →  Event      →  To Phase             │
/// ├────────────────────────────────────────────────────┤
/// │  Idle        →  Start      →  Running              │
/// │  Running     →  Collision  →  GameOver             │
/// │  GameOver    →  Restart    →  Running              │
/// └────────────────────────────────────────────────────┘
/// Idle is only entered at page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    GameOver,
}

impl Phase {
    pub fn is_running(&self) -> bool {
        *self == Phase::Running
    }

    pub fn is_game_over(&self) -> bool {
        *self == Phase::GameOver
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy)]
pub struct Player {
    position: Point,
    velocity_y: f32,
    jumping: bool,
    facing: Facing,
}

impl Player {
    fn new(viewport: Size) -> Self {
        Player {
            position: Point {
                x: PLAYER_START_X,
                y: ground_level(viewport),
            },
            velocity_y: 0.0,
            jumping: false,
            facing: Facing::Right,
        }
    }

    /// One tick of movement and jump physics. Explicit Euler, one step per
    /// fixed tick; the game loop converts real elapsed time into ticks.
    fn update(&mut self, keys: &KeyState, viewport: Size) {
        let ground = ground_level(viewport);
        let max_x = viewport.width - PLAYER_WIDTH;

        if keys.is_pressed(keys::RIGHT) && self.position.x + PLAYER_WIDTH < viewport.width {
            self.position.x += PLAYER_SPEED;
            self.facing = Facing::Right;
        }
        if keys.is_pressed(keys::LEFT) && self.position.x > 0.0 {
            self.position.x -= PLAYER_SPEED;
            self.facing = Facing::Left;
        }
        self.position.x = self.position.x.clamp(0.0, max_x);

        // a new jump cannot start while airborne
        if keys.is_pressed(keys::JUMP) && !self.jumping {
            self.jumping = true;
            self.velocity_y = -JUMP_STRENGTH;
        }
        if self.jumping {
            self.position.y += self.velocity_y;
            self.velocity_y += GRAVITY;
            if self.position.y >= ground {
                self.position.y = ground;
                self.jumping = false;
                self.velocity_y = 0.0;
            }
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_jumping(&self) -> bool {
        self.jumping
    }

    pub fn bounding_box(&self) -> Rect {
        Rect::from_parts(self.position.x, self.position.y, PLAYER_WIDTH, PLAYER_HEIGHT)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Raindrop {
    position: Point,
    velocity: Point,
}

impl Raindrop {
    fn step(&mut self) {
        self.position.x += self.velocity.x;
        self.position.y += self.velocity.y;
    }

    fn in_bounds(&self, viewport: Size) -> bool {
        self.position.x >= -DROP_MARGIN
            && self.position.x <= viewport.width + DROP_MARGIN
            && self.position.y >= -DROP_MARGIN
            && self.position.y <= viewport.height + DROP_MARGIN
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn bounding_box(&self) -> Rect {
        Rect::from_parts(self.position.x, self.position.y, DROP_SIZE, DROP_SIZE)
    }
}

/// Unit vector from `from` toward `target`, scaled by `speed`.
fn aim_velocity(from: Point, target: Point, speed: f32) -> Point {
    let angle = (target.y - from.y).atan2(target.x - from.x);
    Point {
        x: angle.cos() * speed,
        y: angle.sin() * speed,
    }
}

/// Horizontal offset wrapped to achieve seamless infinite scroll: the layer
/// is drawn twice, one viewport width apart.
#[derive(Debug, Clone, Copy)]
pub struct ScrollLayer {
    offset: f32,
    speed: f32,
}

impl ScrollLayer {
    fn new(speed: f32) -> Self {
        ScrollLayer { offset: 0.0, speed }
    }

    fn advance(&mut self, viewport_width: f32) {
        self.offset -= self.speed;
        if self.offset <= -viewport_width {
            self.offset = 0.0;
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }
}

/// Wall-clock run timer; the elapsed time doubles as the score and is frozen
/// at the instant the run ends.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started_at: f64,
    elapsed_ms: f64,
    frozen: bool,
}

impl RunClock {
    fn new() -> Self {
        RunClock {
            started_at: 0.0,
            elapsed_ms: 0.0,
            frozen: false,
        }
    }

    fn start(&mut self, now: f64) {
        self.started_at = now;
        self.elapsed_ms = 0.0;
        self.frozen = false;
    }

    fn tick(&mut self, now: f64) {
        if !self.frozen {
            self.elapsed_ms = now - self.started_at;
        }
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn seconds(&self) -> f64 {
        self.elapsed_ms / 1000.0
    }
}

/// All simulation state for one game instance. Mutated only by `start`,
/// `tick` and `spawn_drop`; rendering reads it through accessors.
pub struct World {
    viewport: Size,
    phase: Phase,
    player: Player,
    drops: Vec<Raindrop>,
    mid: ScrollLayer,
    far: ScrollLayer,
    clock: RunClock,
}

impl World {
    pub fn new(viewport: Size) -> Self {
        World {
            viewport,
            phase: Phase::Idle,
            player: Player::new(viewport),
            drops: Vec::new(),
            mid: ScrollLayer::new(MID_SPEED),
            far: ScrollLayer::new(FAR_SPEED),
            clock: RunClock::new(),
        }
    }

    /// Begin a fresh run: player back at the origin, no drops, score zeroed.
    /// Valid from Idle and GameOver alike (Start and Restart).
    pub fn start(&mut self, now: f64) {
        self.player = Player::new(self.viewport);
        self.drops.clear();
        self.clock.start(now);
        self.phase = Phase::Running;
    }

    /// One fixed simulation tick. A no-op outside of Running, which makes
    /// repeated frames after game over idempotent.
    pub fn tick(&mut self, keys: &KeyState, now: f64) {
        if !self.phase.is_running() {
            return;
        }
        self.clock.tick(now);
        self.mid.advance(self.viewport.width);
        self.far.advance(self.viewport.width);
        self.player.update(keys, self.viewport);
        self.step_drops();
    }

    fn step_drops(&mut self) {
        let viewport = self.viewport;
        // prune before stepping so anything already past the margin is gone
        // this tick regardless of which way it is moving
        self.drops.retain(|drop| drop.in_bounds(viewport));

        let player_box = self.player.bounding_box();
        let mut hit = false;
        for drop in &mut self.drops {
            drop.step();
            if drop.bounding_box().intersects(&player_box) {
                hit = true;
            }
        }
        if hit {
            self.end_run();
        }
    }

    // idempotent: a second collision in the same pass changes nothing
    fn end_run(&mut self) {
        if self.phase.is_running() {
            self.phase = Phase::GameOver;
            self.clock.freeze();
        }
    }

    /// Spawn one drop just off the top or bottom edge, aimed at the player's
    /// current position. A no-op outside of Running or at the drop cap.
    pub fn spawn_drop(&mut self, rng: &mut impl Rng) {
        if !self.phase.is_running() || self.drops.len() >= MAX_DROPS {
            return;
        }
        let position = Point {
            x: rng.gen_range(0.0..self.viewport.width),
            y: if rng.gen_bool(0.5) {
                -DROP_MARGIN
            } else {
                self.viewport.height + DROP_MARGIN
            },
        };
        let speed = rng.gen_range(DROP_MIN_SPEED..DROP_MAX_SPEED);
        self.drops.push(Raindrop {
            position,
            velocity: aim_velocity(position, self.player.position(), speed),
        });
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn drops(&self) -> &[Raindrop] {
        &self.drops
    }

    pub fn mid_layer(&self) -> &ScrollLayer {
        &self.mid
    }

    pub fn far_layer(&self) -> &ScrollLayer {
        &self.far
    }

    pub fn score_seconds(&self) -> f64 {
        self.clock.seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const VIEWPORT: Size = Size {
        width: 1280.0,
        height: 720.0,
    };

    fn running_world() -> World {
        let mut world = World::new(VIEWPORT);
        world.start(0.0);
        world
    }

    fn tick_n(world: &mut World, keys: &KeyState, n: usize) {
        for i in 0..n {
            world.tick(keys, (i + 1) as f64 * 1000.0 / 60.0);
        }
    }

    #[test]
    fn new_world_is_idle_with_no_drops() {
        let world = World::new(VIEWPORT);
        assert_eq!(world.phase(), Phase::Idle);
        assert!(world.drops().is_empty());
        assert_relative_eq!(world.score_seconds(), 0.0);
    }

    #[test]
    fn holding_right_moves_five_per_tick() {
        let mut world = running_world();
        let keys = KeyState::with_pressed(&["ArrowRight"]);
        tick_n(&mut world, &keys, 10);
        assert_relative_eq!(world.player().position().x, 150.0);
        assert_eq!(world.player().facing(), Facing::Right);
    }

    #[test]
    fn holding_left_moves_five_per_tick_and_faces_left() {
        let mut world = running_world();
        let keys = KeyState::with_pressed(&["ArrowLeft"]);
        tick_n(&mut world, &keys, 4);
        assert_relative_eq!(world.player().position().x, 80.0);
        assert_eq!(world.player().facing(), Facing::Left);
    }

    #[test]
    fn player_clamps_at_both_edges() {
        let mut world = running_world();
        let left = KeyState::with_pressed(&["ArrowLeft"]);
        tick_n(&mut world, &left, 100);
        assert_relative_eq!(world.player().position().x, 0.0);

        let right = KeyState::with_pressed(&["ArrowRight"]);
        tick_n(&mut world, &right, 1000);
        let max_x = VIEWPORT.width - 64.0;
        assert!(world.player().position().x <= max_x);
        assert_relative_eq!(world.player().position().x, max_x, epsilon = 5.0);
    }

    #[test]
    fn jump_rises_then_lands_back_on_ground() {
        let mut world = running_world();
        let ground = world.player().position().y;

        // press jump for a single tick, then release
        let jump = KeyState::with_pressed(&["Space"]);
        world.tick(&jump, 16.0);
        assert!(world.player().is_jumping());
        assert!(world.player().position().y < ground);

        let released = KeyState::new();
        let mut landed_on = None;
        for tick in 2..120 {
            world.tick(&released, tick as f64 * 16.0);
            assert!(world.player().position().y >= 0.0);
            if !world.player().is_jumping() {
                landed_on = Some(tick);
                break;
            }
        }
        // velocity sequence -15, -14.2, ... crosses zero displacement on
        // tick 39 with same-tick launch integration
        assert_eq!(landed_on, Some(39));
        assert_relative_eq!(world.player().position().y, ground);
    }

    #[test]
    fn jump_cannot_restart_while_airborne() {
        let mut world = running_world();
        let jump = KeyState::with_pressed(&["Space"]);
        world.tick(&jump, 16.0);
        let height_after_launch = world.player().position().y;

        // still holding jump mid-air must not reset the arc
        world.tick(&jump, 32.0);
        assert!(world.player().position().y < height_after_launch);
    }

    #[test]
    fn drop_moves_linearly_until_removal() {
        let mut world = running_world();
        let mut rng = SmallRng::seed_from_u64(7);
        world.spawn_drop(&mut rng);
        assert_eq!(world.drops().len(), 1);

        let spawn = world.drops()[0].position();
        let first_before = spawn;
        let keys = KeyState::new();
        world.tick(&keys, 16.0);
        let after_one = world.drops()[0].position();
        let velocity = Point {
            x: after_one.x - first_before.x,
            y: after_one.y - first_before.y,
        };
        for n in 2..=5 {
            world.tick(&keys, n as f64 * 16.0);
            let position = world.drops()[0].position();
            assert_relative_eq!(position.x, spawn.x + n as f32 * velocity.x, epsilon = 1e-3);
            assert_relative_eq!(position.y, spawn.y + n as f32 * velocity.y, epsilon = 1e-3);
        }
    }

    #[test]
    fn drop_past_margin_is_removed_regardless_of_velocity_sign() {
        let mut world = running_world();
        world.drops.push(Raindrop {
            position: Point {
                x: VIEWPORT.width + 51.0,
                y: 100.0,
            },
            velocity: Point { x: -2.0, y: 0.0 },
        });
        world.tick(&KeyState::new(), 16.0);
        assert!(world.drops().is_empty());
    }

    #[test]
    fn drop_at_spawn_margin_survives() {
        let mut world = running_world();
        world.drops.push(Raindrop {
            position: Point { x: 200.0, y: -50.0 },
            velocity: Point { x: 0.0, y: 2.0 },
        });
        world.tick(&KeyState::new(), 16.0);
        assert_eq!(world.drops().len(), 1);
    }

    #[test]
    fn spawner_caps_at_ten_live_drops() {
        let mut world = running_world();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..11 {
            world.spawn_drop(&mut rng);
        }
        assert_eq!(world.drops().len(), 10);
    }

    #[test]
    fn spawned_drops_start_on_an_edge_with_speed_in_range() {
        let mut world = running_world();
        let mut rng = SmallRng::seed_from_u64(99);
        for _ in 0..10 {
            world.spawn_drop(&mut rng);
        }
        for drop in world.drops() {
            let position = drop.position();
            assert!(position.x >= 0.0 && position.x < VIEWPORT.width);
            assert!(position.y == -50.0 || position.y == VIEWPORT.height + 50.0);
            let speed = (drop.velocity.x.powi(2) + drop.velocity.y.powi(2)).sqrt();
            assert!((2.0..4.0).contains(&speed), "speed out of range: {speed}");
        }
    }

    #[test]
    fn aim_velocity_points_from_spawn_toward_target() {
        let ground = VIEWPORT.height - 350.0;
        let from = Point { x: 0.0, y: -50.0 };
        let target = Point { x: 100.0, y: ground };
        let speed = 3.0;

        let velocity = aim_velocity(from, target, speed);
        let angle = (ground + 50.0).atan2(100.0);
        assert_relative_eq!(velocity.x, angle.cos() * speed, epsilon = 1e-5);
        assert_relative_eq!(velocity.y, angle.sin() * speed, epsilon = 1e-5);
        // aimed down and to the right
        assert!(velocity.x > 0.0);
        assert!(velocity.y > 0.0);
    }

    #[test]
    fn collision_ends_the_run_and_freezes_the_score() {
        let mut world = running_world();
        let player = world.player().position();
        world.drops.push(Raindrop {
            position: Point {
                x: player.x,
                y: player.y,
            },
            velocity: Point { x: 0.0, y: 0.0 },
        });
        world.tick(&KeyState::new(), 5000.0);
        assert_eq!(world.phase(), Phase::GameOver);
        let frozen = world.score_seconds();
        assert_relative_eq!(frozen, 5.0);

        // further frames change nothing
        world.tick(&KeyState::new(), 9000.0);
        assert_relative_eq!(world.score_seconds(), frozen);
        assert_eq!(world.drops().len(), 1);
    }

    #[test]
    fn spawning_after_game_over_is_a_no_op() {
        let mut world = running_world();
        let player = world.player().position();
        world.drops.push(Raindrop {
            position: Point {
                x: player.x,
                y: player.y,
            },
            velocity: Point { x: 0.0, y: 0.0 },
        });
        world.tick(&KeyState::new(), 16.0);
        assert_eq!(world.phase(), Phase::GameOver);

        let mut rng = SmallRng::seed_from_u64(1);
        world.spawn_drop(&mut rng);
        assert_eq!(world.drops().len(), 1);
    }

    #[test]
    fn restart_resets_score_drops_and_player() {
        let mut world = running_world();
        let mut rng = SmallRng::seed_from_u64(3);
        world.spawn_drop(&mut rng);
        let player = world.player().position();
        world.drops.push(Raindrop {
            position: Point {
                x: player.x,
                y: player.y,
            },
            velocity: Point { x: 0.0, y: 0.0 },
        });
        world.tick(&KeyState::new(), 3000.0);
        assert_eq!(world.phase(), Phase::GameOver);

        world.start(10_000.0);
        assert_eq!(world.phase(), Phase::Running);
        assert!(world.drops().is_empty());
        assert_relative_eq!(world.score_seconds(), 0.0);
        assert_relative_eq!(world.player().position().x, 100.0);
        assert_relative_eq!(world.player().position().y, VIEWPORT.height - 350.0);
    }

    #[test]
    fn scroll_layers_advance_and_wrap() {
        let mut world = running_world();
        let keys = KeyState::new();
        world.tick(&keys, 16.0);
        assert_relative_eq!(world.mid_layer().offset(), -0.5);
        assert_relative_eq!(world.far_layer().offset(), -1.0);

        let mut layer = ScrollLayer::new(1.0);
        for _ in 0..(VIEWPORT.width as usize) {
            layer.advance(VIEWPORT.width);
            assert!(layer.offset() > -VIEWPORT.width);
        }
        // the wrap resets to zero exactly when the offset reaches -width
        assert_relative_eq!(layer.offset(), 0.0);
    }

    #[test]
    fn clock_tracks_elapsed_while_running() {
        let mut world = World::new(VIEWPORT);
        world.start(1_000.0);
        world.tick(&KeyState::new(), 1_250.0);
        assert_relative_eq!(world.score_seconds(), 0.25);
        world.tick(&KeyState::new(), 2_000.0);
        assert_relative_eq!(world.score_seconds(), 1.0);
    }
}
