//! Game state: key tracking, pools, terrain, and the chase camera

use nalgebra::Vector3;
use robot_engine::{Engine, EngineError, GameHooks, TickContext};

use crate::bullet::BulletPool;
use crate::robot::RobotPool;
use crate::terrain::Terrain;
use crate::AssetPaths;

/// Robots created at startup; the first is the player.
const NUM_ROBOTS: usize = 4;
/// Bullet roster size shared by all robots.
const NUM_BULLETS: usize = 10;

/// Chase camera orbit distance behind the player.
const CAMERA_DISTANCE: f32 = 8.0;
/// Chase camera height.
const CAMERA_HEIGHT: f32 = 7.5;
/// Sideways offset angle so the player is not dead center.
const CAMERA_ANGLE_OFFSET: f32 = 0.18;

const KEY_COUNT: usize = glfw::ffi::KEY_LAST as usize + 1;

/// Pressed/released state for every key code.
pub struct KeyStates {
    down: [bool; KEY_COUNT],
}

impl Default for KeyStates {
    fn default() -> Self {
        Self {
            down: [false; KEY_COUNT],
        }
    }
}

impl KeyStates {
    /// Record a key event.
    pub fn handle(&mut self, key: glfw::Key, action: glfw::Action) {
        let code = key as i32;
        if !(0..KEY_COUNT as i32).contains(&code) {
            return;
        }

        match action {
            glfw::Action::Press => self.down[code as usize] = true,
            glfw::Action::Release => self.down[code as usize] = false,
            glfw::Action::Repeat => {}
        }
    }

    /// True while the key is held.
    pub fn is_down(&self, key: glfw::Key) -> bool {
        let code = key as i32;
        (0..KEY_COUNT as i32).contains(&code) && self.down[code as usize]
    }
}

/// The robots game: terrain, pools, player, and input state.
pub struct Game {
    keys: KeyStates,
    terrain: Terrain,
    robots: RobotPool,
    bullets: BulletPool,
    player: Option<usize>,
    exit_requested: bool,
}

impl Game {
    /// Load assets, build the terrain, and spawn the starting robots.
    pub fn new(engine: &mut Engine, assets: &AssetPaths) -> Result<Self, EngineError> {
        let terrain = Terrain::create(engine, &assets.heightmap, &assets.terrain_texture)?;

        let bullet_mesh = engine.load_model(&assets.bullet_model, &assets.bullet_texture)?;
        let mut bullet_objects = Vec::with_capacity(NUM_BULLETS);
        for _ in 0..NUM_BULLETS {
            bullet_objects.push(engine.create_object(bullet_mesh)?);
        }

        let robot_mesh = engine.load_model(&assets.robot_model, &assets.robot_texture)?;
        let mut robot_objects = Vec::with_capacity(NUM_ROBOTS);
        for _ in 0..NUM_ROBOTS {
            robot_objects.push(engine.create_object(robot_mesh)?);
        }

        let bounds = terrain.field().extent();
        let registry = engine.registry_mut();
        let bullets = BulletPool::new(registry, bullet_objects, bounds);
        let mut robots = RobotPool::new(registry, robot_objects);

        let mut player = None;
        for i in 0..NUM_ROBOTS {
            let spawned = robots.spawn(
                registry,
                Vector3::new(10.0 * i as f32 + 5.0, 5.0, 0.0),
                i == 0,
            );
            if i == 0 {
                player = spawned;
            }
        }

        log::info!("game ready: {NUM_ROBOTS} robots, {NUM_BULLETS} bullet slots");

        Ok(Self {
            keys: KeyStates::default(),
            terrain,
            robots,
            bullets,
            player,
            exit_requested: false,
        })
    }

    /// Orbit the camera behind the player, looking ahead of it.
    fn update_camera(&self, ctx: &mut TickContext<'_>) {
        let Some(player) = self.player.and_then(|index| self.robots.get(index)) else {
            return;
        };
        let Some(object) = ctx.objects.object(player.object()) else {
            return;
        };

        let rotation = player.rotation();
        let position = object.position;

        let eye = Vector3::new(
            position.x + (rotation - CAMERA_ANGLE_OFFSET).sin() * CAMERA_DISTANCE,
            position.y + (rotation - CAMERA_ANGLE_OFFSET).cos() * CAMERA_DISTANCE,
            CAMERA_HEIGHT,
        );
        ctx.camera.eye = eye;
        ctx.camera.target = Vector3::new(
            eye.x - rotation.sin(),
            eye.y - rotation.cos(),
            eye.z - 0.2,
        );
    }
}

impl GameHooks for Game {
    fn on_tick(&mut self, ctx: &mut TickContext<'_>) {
        if self.exit_requested {
            ctx.request_exit();
            return;
        }

        self.robots
            .update(ctx.objects, ctx.elapsed_ms, &self.keys, &mut self.bullets);
        self.bullets.update(ctx.objects, ctx.elapsed_ms);

        if let Some(player) = self.player.and_then(|index| self.robots.get(index)) {
            self.terrain.clamp_object(ctx.objects, player.object());
        }

        self.update_camera(ctx);
    }

    fn on_key(&mut self, key: glfw::Key, action: glfw::Action) {
        if key == glfw::Key::Escape && action == glfw::Action::Press {
            self.exit_requested = true;
            return;
        }
        self.keys.handle(key, action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_states_track_press_and_release() {
        let mut keys = KeyStates::default();
        assert!(!keys.is_down(glfw::Key::W));

        keys.handle(glfw::Key::W, glfw::Action::Press);
        assert!(keys.is_down(glfw::Key::W));

        keys.handle(glfw::Key::W, glfw::Action::Repeat);
        assert!(keys.is_down(glfw::Key::W));

        keys.handle(glfw::Key::W, glfw::Action::Release);
        assert!(!keys.is_down(glfw::Key::W));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let mut keys = KeyStates::default();
        keys.handle(glfw::Key::Unknown, glfw::Action::Press);
        assert!(!keys.is_down(glfw::Key::Unknown));
    }
}
