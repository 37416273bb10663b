//! Robots: player-controlled movement, firing, and the robot roster

use bitflags::bitflags;
use nalgebra::Vector3;
use robot_engine::{ObjectHandle, ObjectRegistry};

use crate::bullet::BulletPool;
use crate::game::KeyStates;

const TWO_PI: f32 = std::f32::consts::TAU;

/// Units of velocity gained per update while a movement key is held.
const ACCELERATION: f32 = 0.0004;
/// Velocity multiplier applied every update.
const FRICTION: f32 = 0.989;
/// Velocity magnitude cap.
const MAX_VELOCITY: f32 = 0.3;
/// Radians of turn per update while a turn key is held.
const ROTATION_SPEED: f32 = 0.006;
/// Shots per second.
const FIRE_RATE: f64 = 10.0;
/// Muzzle velocity added on top of the robot's own motion.
const SHOT_SPEED: f32 = 0.05;
/// Model faces up by default; pitch it onto its feet.
const MODEL_PITCH_DEG: f32 = 270.0;

bitflags! {
    /// Actions a robot can perform in one tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Actions: u8 {
        /// Accelerate forward.
        const FORWARD = 1 << 0;
        /// Accelerate backward.
        const BACKWARD = 1 << 1;
        /// Turn left.
        const TURN_LEFT = 1 << 2;
        /// Turn right.
        const TURN_RIGHT = 1 << 3;
        /// Fire a bullet.
        const SHOOT = 1 << 4;
    }
}

/// Keyboard bindings for one robot.
pub struct ActionKeyMap {
    /// Key accelerating forward.
    pub forward: glfw::Key,
    /// Key accelerating backward.
    pub backward: glfw::Key,
    /// Key turning left.
    pub left: glfw::Key,
    /// Key turning right.
    pub right: glfw::Key,
    /// Key firing.
    pub shoot: glfw::Key,
}

impl Default for ActionKeyMap {
    fn default() -> Self {
        Self {
            forward: glfw::Key::W,
            backward: glfw::Key::S,
            left: glfw::Key::A,
            right: glfw::Key::D,
            shoot: glfw::Key::Space,
        }
    }
}

impl ActionKeyMap {
    /// Actions currently active according to the key states.
    pub fn active(&self, keys: &KeyStates) -> Actions {
        let mut actions = Actions::empty();
        if keys.is_down(self.forward) {
            actions |= Actions::FORWARD;
        }
        if keys.is_down(self.backward) {
            actions |= Actions::BACKWARD;
        }
        if keys.is_down(self.left) {
            actions |= Actions::TURN_LEFT;
        }
        if keys.is_down(self.right) {
            actions |= Actions::TURN_RIGHT;
        }
        if keys.is_down(self.shoot) {
            actions |= Actions::SHOOT;
        }
        actions
    }
}

/// Ground-vehicle physics: velocity along a heading, with friction,
/// clamping, and wrap-around turning.
#[derive(Debug, Clone, Copy, Default)]
pub struct Locomotion {
    /// Signed speed; forward motion is negative.
    pub velocity: f32,
    /// Heading in radians, kept in `[0, 2π]`.
    pub rotation: f32,
}

impl Locomotion {
    /// Apply one tick of steering input.
    pub fn steer(&mut self, actions: Actions) {
        if actions.contains(Actions::FORWARD) {
            self.velocity -= ACCELERATION;
        }
        if actions.contains(Actions::BACKWARD) {
            self.velocity += ACCELERATION;
        }
        if actions.contains(Actions::TURN_LEFT) {
            self.rotation -= ROTATION_SPEED;
            if self.rotation < 0.0 {
                self.rotation += TWO_PI;
            }
        }
        if actions.contains(Actions::TURN_RIGHT) {
            self.rotation += ROTATION_SPEED;
            if self.rotation > TWO_PI {
                self.rotation -= TWO_PI;
            }
        }

        self.velocity = self.velocity.clamp(-MAX_VELOCITY, MAX_VELOCITY);
        self.velocity *= FRICTION;
    }

    /// Position delta for this tick.
    pub fn displacement(&self, elapsed_ms: f64) -> (f32, f32) {
        let step = self.velocity * elapsed_ms as f32;
        (self.rotation.sin() * step, self.rotation.cos() * step)
    }
}

/// A robot in the arena.
pub struct Robot {
    object: ObjectHandle,
    key_map: ActionKeyMap,
    player_controlled: bool,
    hp: u16,
    motion: Locomotion,
    fire_cooldown_ms: f64,
    active: bool,
}

impl Robot {
    fn new(object: ObjectHandle) -> Self {
        Self {
            object,
            key_map: ActionKeyMap::default(),
            player_controlled: false,
            hp: 100,
            motion: Locomotion::default(),
            fire_cooldown_ms: 0.0,
            active: false,
        }
    }

    /// Handle of the engine object this robot drives.
    pub fn object(&self) -> ObjectHandle {
        self.object
    }

    /// Current heading in radians.
    pub fn rotation(&self) -> f32 {
        self.motion.rotation
    }

    /// Advance the robot one tick. Returns false once it has died.
    fn update(
        &mut self,
        objects: &mut ObjectRegistry,
        elapsed_ms: f64,
        actions: Actions,
        bullets: &mut BulletPool,
    ) -> bool {
        self.motion.steer(actions);
        self.fire_cooldown_ms = (self.fire_cooldown_ms - elapsed_ms).max(0.0);

        let (dx, dy) = self.motion.displacement(elapsed_ms);
        let mut muzzle_position = None;

        if let Some(object) = objects.object_mut(self.object) {
            object.position.x += dx;
            object.position.y += dy;
            object.rotation.z = self.motion.rotation;
            muzzle_position = Some(object.position);
        }

        if actions.contains(Actions::SHOOT) && self.fire_cooldown_ms == 0.0 {
            if let Some(position) = muzzle_position {
                // Forward motion is negative velocity, so it adds speed.
                bullets.spawn(
                    objects,
                    position,
                    self.motion.rotation,
                    SHOT_SPEED - self.motion.velocity,
                );
                self.fire_cooldown_ms = 1000.0 / FIRE_RATE;
            }
        }

        self.hp > 0
    }
}

/// Fixed roster of robots with a free-index stack.
pub struct RobotPool {
    robots: Vec<Robot>,
    free: Vec<usize>,
}

impl RobotPool {
    /// Wrap pre-created engine objects; all slots start free and hidden.
    pub fn new(objects: &mut ObjectRegistry, handles: Vec<ObjectHandle>) -> Self {
        for &handle in &handles {
            if let Some(object) = objects.object_mut(handle) {
                object.visible = false;
            }
        }

        let free = (0..handles.len()).rev().collect();
        let robots = handles.into_iter().map(Robot::new).collect();

        Self { robots, free }
    }

    /// Activate a robot at `position`, returning its roster index.
    pub fn spawn(
        &mut self,
        objects: &mut ObjectRegistry,
        position: Vector3<f32>,
        player_controlled: bool,
    ) -> Option<usize> {
        let index = self.free.pop()?;

        let robot = &mut self.robots[index];
        robot.active = true;
        robot.player_controlled = player_controlled;
        robot.hp = 100;
        robot.motion = Locomotion::default();
        robot.fire_cooldown_ms = 0.0;

        if let Some(object) = objects.object_mut(robot.object) {
            object.position = position;
            object.rotation = Vector3::new(MODEL_PITCH_DEG.to_radians(), 0.0, 0.0);
            object.visible = true;
        }

        Some(index)
    }

    /// Borrow a robot by roster index.
    pub fn get(&self, index: usize) -> Option<&Robot> {
        self.robots.get(index).filter(|robot| robot.active)
    }

    /// Advance every active robot; the player-controlled ones read the key
    /// states. Dead robots are hidden and returned to the pool.
    pub fn update(
        &mut self,
        objects: &mut ObjectRegistry,
        elapsed_ms: f64,
        keys: &KeyStates,
        bullets: &mut BulletPool,
    ) {
        for index in 0..self.robots.len() {
            if !self.robots[index].active {
                continue;
            }

            let actions = if self.robots[index].player_controlled {
                self.robots[index].key_map.active(keys)
            } else {
                Actions::empty()
            };

            let alive = self.robots[index].update(objects, elapsed_ms, actions, bullets);
            if !alive {
                let robot = &mut self.robots[index];
                robot.active = false;
                if let Some(object) = objects.object_mut(robot.object) {
                    object.visible = false;
                }
                self.free.push(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn forward_accelerates_negative() {
        let mut motion = Locomotion::default();
        motion.steer(Actions::FORWARD);
        assert!(motion.velocity < 0.0);
    }

    #[test]
    fn velocity_is_clamped() {
        let mut motion = Locomotion {
            velocity: 10.0,
            rotation: 0.0,
        };
        motion.steer(Actions::empty());
        assert_relative_eq!(motion.velocity, MAX_VELOCITY * FRICTION, epsilon = 1e-6);

        motion.velocity = -10.0;
        motion.steer(Actions::empty());
        assert_relative_eq!(motion.velocity, -MAX_VELOCITY * FRICTION, epsilon = 1e-6);
    }

    #[test]
    fn friction_decays_velocity_toward_zero() {
        let mut motion = Locomotion {
            velocity: 0.1,
            rotation: 0.0,
        };
        for _ in 0..1000 {
            motion.steer(Actions::empty());
        }
        assert!(motion.velocity.abs() < 1e-4);
    }

    #[test]
    fn rotation_wraps_at_the_ends() {
        let mut motion = Locomotion {
            velocity: 0.0,
            rotation: 0.001,
        };
        motion.steer(Actions::TURN_LEFT);
        assert!(motion.rotation > 6.0);

        motion.rotation = TWO_PI - 0.001;
        motion.steer(Actions::TURN_RIGHT);
        assert!(motion.rotation < 1.0);
    }

    #[test]
    fn displacement_follows_heading() {
        let motion = Locomotion {
            velocity: -0.1, // moving forward
            rotation: 0.0,
        };
        let (dx, dy) = motion.displacement(10.0);
        assert_relative_eq!(dx, 0.0, epsilon = 1e-6);
        assert_relative_eq!(dy, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut motion = Locomotion::default();
        motion.steer(Actions::FORWARD | Actions::BACKWARD);
        assert_relative_eq!(motion.velocity, 0.0, epsilon = 1e-7);
    }
}
