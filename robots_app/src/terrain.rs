//! Heightmap terrain: mesh generation and movement clamping

use nalgebra::Vector3;
use robot_engine::assets::TextureData;
use robot_engine::{Engine, EngineError, ObjectHandle, ObjectRegistry, Vertex};

/// World-space edge length of one terrain quad.
const TILE_SIZE: f32 = 2.0;
/// Divisor turning an 8-bit height sample into world units.
const HEIGHT_SCALE: f32 = 4.0;
/// Fraction of the remaining height difference applied per tick.
const HEIGHT_EASE: f32 = 30.0;

/// Sampled height grid, independent of any engine object.
pub struct HeightField {
    heights: Vec<f32>,
    quads_per_side: u32,
}

impl HeightField {
    /// Sample a square heightmap's red channel into world-space heights.
    pub fn from_image(image: &TextureData) -> Self {
        assert_eq!(image.width, image.height, "heightmap must be square");
        let side = image.width as usize;

        let heights = (0..side * side)
            .map(|i| f32::from(image.pixels[i * 4]) / HEIGHT_SCALE)
            .collect();

        Self {
            heights,
            quads_per_side: image.width - 1,
        }
    }

    /// Number of quads along one side.
    pub fn quads_per_side(&self) -> u32 {
        self.quads_per_side
    }

    /// World-space extent of the terrain along each axis.
    pub fn extent(&self) -> f32 {
        self.quads_per_side as f32 * TILE_SIZE
    }

    /// Build the grid mesh: `(size+1)^2` vertices, six indices per quad.
    pub fn build_mesh(&self) -> (Vec<Vertex>, Vec<u32>) {
        let size = self.quads_per_side;
        let side = (size + 1) as usize;
        let num_points = side * side;

        let mut vertices = Vec::with_capacity(num_points);
        let mut indices = Vec::with_capacity(6 * (size as usize) * (size as usize));

        let mut row = 0u32;
        for i in 0..num_points {
            if i % side == 0 {
                row += 1;
            }

            let x_index = (i / side) as f32;
            let y_index = (i % side) as f32;

            vertices.push(Vertex {
                position: [x_index * TILE_SIZE, y_index * TILE_SIZE, self.heights[i]],
                color: [0.0, 0.0, 0.0],
                tex_coord: [
                    0.2 * size as f32 * (y_index / size as f32),
                    0.2 * size as f32 * (row as f32 / side as f32),
                ],
            });

            // Two triangles per quad, skipping the far row and column.
            if (i + 1) % side != 0 && i < num_points - side {
                let i = i as u32;
                let side = side as u32;
                indices.extend_from_slice(&[i, i + side, i + side + 1, i + side + 1, i + 1, i]);
            }
        }

        (vertices, indices)
    }

    /// Keep `position` on the terrain: hard clamp at the edges, then ease
    /// the height toward the sampled grid point.
    pub fn clamp_position(&self, position: &mut Vector3<f32>) {
        let max = self.extent();
        position.x = position.x.clamp(0.0, max);
        position.y = position.y.clamp(0.0, max);

        let side = self.quads_per_side + 1;
        let x_index = (position.x / TILE_SIZE) as u32;
        let y_index = (position.y / TILE_SIZE) as u32;
        let index = (side * x_index + y_index) as usize;
        let ground = self.heights[index];

        if position.z < ground {
            position.z += (ground - position.z) / HEIGHT_EASE;
        } else if position.z > ground {
            position.z -= (position.z - ground) / HEIGHT_EASE;
        }
    }
}

/// Height field plus the engine object rendering it.
pub struct Terrain {
    field: HeightField,
    #[allow(dead_code)]
    object: ObjectHandle,
}

impl Terrain {
    /// Load a heightmap image, build the terrain mesh, and register it as
    /// a visible object at the origin.
    pub fn create(
        engine: &mut Engine,
        heightmap_path: &str,
        texture_path: &str,
    ) -> Result<Self, EngineError> {
        let heightmap = TextureData::load(heightmap_path)?;
        let field = HeightField::from_image(&heightmap);

        let (vertices, indices) = field.build_mesh();
        let texture = TextureData::load(texture_path)?;
        let mesh = engine.create_mesh(&vertices, &indices, &texture)?;
        let object = engine.create_object(mesh)?;

        log::info!(
            "terrain: {0}x{0} quads, {1} vertices",
            field.quads_per_side(),
            vertices.len()
        );

        Ok(Self { field, object })
    }

    /// The underlying height grid.
    pub fn field(&self) -> &HeightField {
        &self.field
    }

    /// Clamp a game object's position in place.
    pub fn clamp_object(&self, objects: &mut ObjectRegistry, handle: ObjectHandle) {
        if let Some(object) = objects.object_mut(handle) {
            self.field.clamp_position(&mut object.position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Square heightmap image whose every red sample decodes to `height`.
    fn flat_field(size: u32, height: f32) -> HeightField {
        let side = (size + 1) as usize;
        let red = (height * 4.0) as u8;
        let pixels = (0..side * side)
            .flat_map(|_| [red, 0, 0, 255])
            .collect();
        HeightField::from_image(&TextureData::from_rgba8(size + 1, size + 1, pixels))
    }

    #[test]
    fn mesh_counts_match_grid() {
        let field = flat_field(3, 0.0);
        let (vertices, indices) = field.build_mesh();
        assert_eq!(vertices.len(), 16);
        assert_eq!(indices.len(), 6 * 9);
    }

    #[test]
    fn single_quad_indices_wind_consistently() {
        let field = flat_field(1, 0.0);
        let (_, indices) = field.build_mesh();
        assert_eq!(indices, vec![0, 2, 3, 3, 1, 0]);
    }

    #[test]
    fn vertex_positions_follow_the_grid() {
        let pixels = vec![
            4, 0, 0, 255, 8, 0, 0, 255, //
            12, 0, 0, 255, 16, 0, 0, 255,
        ];
        let field = HeightField::from_image(&TextureData::from_rgba8(2, 2, pixels));
        let (vertices, _) = field.build_mesh();
        // Point index i maps to x = i / side, y = i % side.
        assert_eq!(vertices[0].position, [0.0, 0.0, 1.0]);
        assert_eq!(vertices[1].position, [0.0, 2.0, 2.0]);
        assert_eq!(vertices[2].position, [2.0, 0.0, 3.0]);
        assert_eq!(vertices[3].position, [2.0, 2.0, 4.0]);
    }

    #[test]
    fn heights_sample_red_channel() {
        let pixels = vec![
            40, 0, 0, 255, 80, 0, 0, 255, //
            120, 0, 0, 255, 200, 0, 0, 255,
        ];
        let image = TextureData::from_rgba8(2, 2, pixels);
        let field = HeightField::from_image(&image);
        assert_eq!(field.quads_per_side(), 1);
        assert_eq!(field.heights, vec![10.0, 20.0, 30.0, 50.0]);
    }

    #[test]
    fn edges_are_hard_clamped() {
        let field = flat_field(4, 0.0);
        let mut position = Vector3::new(-5.0, 100.0, 0.0);
        field.clamp_position(&mut position);
        assert_eq!(position.x, 0.0);
        assert_eq!(position.y, field.extent());
    }

    #[test]
    fn height_eases_toward_ground() {
        let field = flat_field(4, 30.0);

        let mut below = Vector3::new(1.0, 1.0, 0.0);
        field.clamp_position(&mut below);
        assert_relative_eq!(below.z, 1.0, epsilon = 1e-5);

        let mut above = Vector3::new(1.0, 1.0, 60.0);
        field.clamp_position(&mut above);
        assert_relative_eq!(above.z, 59.0, epsilon = 1e-5);
    }

    #[test]
    fn settled_position_stays_put() {
        let field = flat_field(2, 12.0);
        let mut position = Vector3::new(2.0, 2.0, 12.0);
        field.clamp_position(&mut position);
        assert_relative_eq!(position.z, 12.0, epsilon = 1e-5);
    }
}
