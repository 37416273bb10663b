//! Bullets and their activation pool
//!
//! Bullets are a fixed roster of pre-created engine objects. Spawning
//! activates a free slot and makes its object visible; leaving the arena
//! returns the slot and hides the object again.

use nalgebra::Vector3;
use robot_engine::{ObjectHandle, ObjectRegistry};

/// Radians of decorative spin per update on every axis.
const SPIN_SPEED: f32 = 0.008;
const TWO_PI: f32 = std::f32::consts::TAU;

/// Move a bullet one step along its heading.
fn advance(position: &mut Vector3<f32>, rotation: f32, velocity: f32, elapsed_ms: f64) {
    let step = velocity * elapsed_ms as f32;
    position.x -= rotation.sin() * step;
    position.y -= rotation.cos() * step;
}

/// Bullets live while strictly inside the square arena.
fn in_bounds(position: &Vector3<f32>, bounds: f32) -> bool {
    position.x > 0.0 && position.x < bounds && position.y > 0.0 && position.y < bounds
}

/// One bullet slot.
struct Bullet {
    object: ObjectHandle,
    velocity: f32,
    rotation: f32,
    active: bool,
}

impl Bullet {
    fn new(object: ObjectHandle) -> Self {
        Self {
            object,
            velocity: 0.0,
            rotation: 0.0,
            active: false,
        }
    }

    /// Advance the bullet. Returns false once it leaves the arena.
    fn update(&self, objects: &mut ObjectRegistry, elapsed_ms: f64, bounds: f32) -> bool {
        let Some(object) = objects.object_mut(self.object) else {
            return false;
        };

        advance(&mut object.position, self.rotation, self.velocity, elapsed_ms);

        // Spin on all axes, just for looks.
        for axis in 0..3 {
            object.rotation[axis] = (object.rotation[axis] + SPIN_SPEED) % TWO_PI;
        }

        in_bounds(&object.position, bounds)
    }
}

/// Fixed roster of bullets with a free-index stack.
pub struct BulletPool {
    bullets: Vec<Bullet>,
    free: Vec<usize>,
    bounds: f32,
}

impl BulletPool {
    /// Wrap pre-created engine objects; all slots start free and hidden.
    pub fn new(objects: &mut ObjectRegistry, handles: Vec<ObjectHandle>, bounds: f32) -> Self {
        for &handle in &handles {
            if let Some(object) = objects.object_mut(handle) {
                object.visible = false;
            }
        }

        let free = (0..handles.len()).rev().collect();
        let bullets = handles.into_iter().map(Bullet::new).collect();

        Self {
            bullets,
            free,
            bounds,
        }
    }

    /// Fire a bullet from `position` along `rotation`. A full pool drops
    /// the shot.
    pub fn spawn(
        &mut self,
        objects: &mut ObjectRegistry,
        position: Vector3<f32>,
        rotation: f32,
        velocity: f32,
    ) {
        let Some(index) = self.free.pop() else {
            return;
        };

        let bullet = &mut self.bullets[index];
        bullet.active = true;
        bullet.rotation = rotation;
        bullet.velocity = velocity;

        if let Some(object) = objects.object_mut(bullet.object) {
            object.position = position;
            object.visible = true;
        }
    }

    /// Advance every active bullet, returning spent ones to the pool.
    pub fn update(&mut self, objects: &mut ObjectRegistry, elapsed_ms: f64) {
        for index in 0..self.bullets.len() {
            if !self.bullets[index].active {
                continue;
            }

            let alive = self.bullets[index].update(objects, elapsed_ms, self.bounds);
            if !alive {
                let bullet = &mut self.bullets[index];
                bullet.active = false;
                if let Some(object) = objects.object_mut(bullet.object) {
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
    fn advances_opposite_the_heading() {
        // Heading 0 points along -Y for bullets.
        let mut position = Vector3::new(10.0, 10.0, 0.0);
        advance(&mut position, 0.0, 0.5, 2.0);
        assert_relative_eq!(position.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(position.y, 9.0, epsilon = 1e-5);

        let mut sideways = Vector3::new(10.0, 10.0, 0.0);
        advance(&mut sideways, std::f32::consts::FRAC_PI_2, 0.5, 2.0);
        assert_relative_eq!(sideways.x, 9.0, epsilon = 1e-4);
        assert_relative_eq!(sideways.y, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn bounds_are_exclusive() {
        let bounds = 512.0;
        assert!(in_bounds(&Vector3::new(1.0, 1.0, 0.0), bounds));
        assert!(!in_bounds(&Vector3::new(0.0, 1.0, 0.0), bounds));
        assert!(!in_bounds(&Vector3::new(1.0, 512.0, 0.0), bounds));
        assert!(!in_bounds(&Vector3::new(-3.0, 1.0, 0.0), bounds));
    }

    #[test]
    fn height_does_not_affect_liveness() {
        assert!(in_bounds(&Vector3::new(5.0, 5.0, 1000.0), 512.0));
    }
}
