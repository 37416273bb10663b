//! Camera state and the per-frame uniform data derived from it

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// Look-at camera with a Z-up world.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Eye position.
    pub eye: Vector3<f32>,
    /// Point the camera looks at.
    pub target: Vector3<f32>,
    /// Vertical field of view in degrees.
    pub fov_deg: f32,
    /// Near clip plane.
    pub near: f32,
    /// Far clip plane.
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vector3::new(5.0, 5.0, 5.0),
            target: Vector3::zeros(),
            fov_deg: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// View matrix for the current eye/target pair.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            &Point3::from(self.eye),
            &Point3::from(self.target),
            &Vector3::z_axis(),
        )
    }

    /// Projection matrix for the given aspect ratio, with the Y axis
    /// flipped for Vulkan clip space.
    pub fn projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        let mut proj =
            Perspective3::new(aspect, self.fov_deg.to_radians(), self.near, self.far)
                .to_homogeneous();
        proj[(1, 1)] *= -1.0;
        proj
    }
}

/// Uniform buffer contents: view and projection matrices, column major.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUbo {
    /// View matrix.
    pub view: [[f32; 4]; 4],
    /// Projection matrix (Y already flipped).
    pub proj: [[f32; 4]; 4],
}

impl CameraUbo {
    /// Capture the camera's matrices for the given aspect ratio.
    pub fn new(camera: &Camera, aspect: f32) -> Self {
        Self {
            view: camera.view_matrix().into(),
            proj: camera.projection_matrix(aspect).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn view_matrix_moves_eye_to_origin() {
        let camera = Camera {
            eye: Vector3::new(0.0, -3.0, 0.0),
            target: Vector3::zeros(),
            ..Camera::default()
        };
        let view = camera.view_matrix();
        let eye = view.transform_point(&Point3::new(0.0, -3.0, 0.0));
        assert_relative_eq!(eye.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let camera = Camera::default();
        let proj = camera.projection_matrix(800.0 / 600.0);
        assert!(proj[(1, 1)] < 0.0);

        let unflipped =
            Perspective3::new(800.0 / 600.0, 45.0f32.to_radians(), 0.1, 100.0)
                .to_homogeneous();
        assert_relative_eq!(proj[(1, 1)], -unflipped[(1, 1)], epsilon = 1e-6);
        assert_relative_eq!(proj[(0, 0)], unflipped[(0, 0)], epsilon = 1e-6);
    }

    #[test]
    fn ubo_matrices_are_column_major() {
        let camera = Camera::default();
        let ubo = CameraUbo::new(&camera, 1.0);
        let proj = camera.projection_matrix(1.0);
        // nalgebra's array conversion is [column][row].
        assert_relative_eq!(ubo.proj[1][1], proj[(1, 1)], epsilon = 1e-6);
        assert_relative_eq!(ubo.proj[3][2], proj[(2, 3)], epsilon = 1e-6);
    }

    #[test]
    fn ubo_byte_size_is_two_matrices() {
        assert_eq!(std::mem::size_of::<CameraUbo>(), 128);
    }
}
