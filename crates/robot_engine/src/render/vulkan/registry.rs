//! Bounded mesh and game-object tables
//!
//! Handles are indices into slot arenas, so destroying an entry never moves
//! the others and a stale handle can only miss, not alias.

use ash::vk;
use nalgebra::{Matrix4, Rotation3, Vector3};
use thiserror::Error;

use crate::pool::SlotPool;
use crate::render::vulkan::buffer::{IndexBuffer, VertexBuffer};
use crate::render::vulkan::commands::CommandPool;
use crate::render::vulkan::texture::Texture;

/// Maximum number of registered meshes.
pub const MAX_MESHES: usize = 20;
/// Maximum number of live game objects.
pub const MAX_OBJECTS: usize = 500;

/// Registry errors: capacity rejections and stale handles.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// Mesh table is full; the mesh was not registered.
    #[error("mesh limit reached ({max} meshes)")]
    MeshCapacity {
        /// The table capacity.
        max: usize,
    },

    /// Object table is full; no object was created.
    #[error("object limit reached ({max} objects)")]
    ObjectCapacity {
        /// The table capacity.
        max: usize,
    },

    /// The handle does not refer to a live mesh.
    #[error("unknown mesh handle")]
    UnknownMesh,

    /// The handle does not refer to a live object.
    #[error("unknown object handle")]
    UnknownObject,

    /// The mesh is still referenced by live objects.
    #[error("mesh is referenced by {objects} live objects")]
    MeshInUse {
        /// Number of objects still drawing the mesh.
        objects: usize,
    },

    /// Secondary command buffer allocation failed (fatal tier).
    #[error("command buffer allocation failed: {0}")]
    Allocation(String),
}

/// Stable index of a registered mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub(crate) usize);

/// Stable index of a live game object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle(pub(crate) usize);

/// Immutable GPU-side mesh: geometry buffers, texture, and the descriptor
/// set binding them to the shared uniform buffer.
pub struct Mesh {
    pub(crate) vertex_buffer: VertexBuffer,
    pub(crate) index_buffer: IndexBuffer,
    // Kept alive for the descriptor set that references its view/sampler.
    #[allow(dead_code)]
    pub(crate) texture: Texture,
    pub(crate) descriptor_set: vk::DescriptorSet,
}

impl Mesh {
    /// Assemble a mesh from its uploaded parts.
    pub(crate) fn new(
        vertex_buffer: VertexBuffer,
        index_buffer: IndexBuffer,
        texture: Texture,
        descriptor_set: vk::DescriptorSet,
    ) -> Self {
        Self {
            vertex_buffer,
            index_buffer,
            texture,
            descriptor_set,
        }
    }

    /// Number of indices drawn per instance.
    pub fn index_count(&self) -> u32 {
        self.index_buffer.index_count()
    }
}

/// A renderable object: mesh reference, transform, visibility, and its
/// secondary command buffer.
pub struct GameObject {
    /// Mesh this object draws.
    pub(crate) mesh: MeshHandle,
    /// World position.
    pub position: Vector3<f32>,
    /// Euler rotation in radians (applied X, then Y, then Z).
    pub rotation: Vector3<f32>,
    /// Hidden objects contribute no draw calls.
    pub visible: bool,
    pub(crate) command_buffer: vk::CommandBuffer,
}

impl GameObject {
    fn new(mesh: MeshHandle, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            mesh,
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            visible: true,
            command_buffer,
        }
    }

    /// Mesh this object draws.
    pub fn mesh(&self) -> MeshHandle {
        self.mesh
    }

    /// Model matrix derived from position and rotation.
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&self.position)
            * Rotation3::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z)
                .to_homogeneous()
    }
}

/// Bounded tables of meshes and game objects.
pub struct ObjectRegistry {
    meshes: SlotPool<Mesh>,
    objects: SlotPool<GameObject>,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectRegistry {
    /// Create empty tables at the fixed capacities.
    pub fn new() -> Self {
        Self {
            meshes: SlotPool::new(MAX_MESHES),
            objects: SlotPool::new(MAX_OBJECTS),
        }
    }

    /// True when another mesh can be registered.
    pub fn has_mesh_capacity(&self) -> bool {
        !self.meshes.is_full()
    }

    /// Register an already-uploaded mesh. At capacity the mesh is dropped
    /// (freeing its GPU resources), the tables are unchanged, and the
    /// rejection is logged.
    pub fn insert_mesh(&mut self, mesh: Mesh) -> Result<MeshHandle, RegistryError> {
        match self.meshes.insert(mesh) {
            Ok(index) => Ok(MeshHandle(index)),
            Err(_rejected) => {
                log::warn!("mesh limit reached ({MAX_MESHES} meshes)");
                Err(RegistryError::MeshCapacity { max: MAX_MESHES })
            }
        }
    }

    /// Create a game object drawing `mesh`, with an identity transform and
    /// a freshly allocated secondary command buffer.
    pub fn create_object(
        &mut self,
        command_pool: &CommandPool,
        mesh: MeshHandle,
    ) -> Result<ObjectHandle, RegistryError> {
        if self.meshes.get(mesh.0).is_none() {
            return Err(RegistryError::UnknownMesh);
        }
        if self.objects.is_full() {
            log::warn!("object limit reached ({MAX_OBJECTS} objects)");
            return Err(RegistryError::ObjectCapacity { max: MAX_OBJECTS });
        }

        let command_buffer = command_pool
            .allocate_secondary()
            .map_err(|e| RegistryError::Allocation(e.to_string()))?;

        self.insert_object(GameObject::new(mesh, command_buffer))
    }

    fn insert_object(&mut self, object: GameObject) -> Result<ObjectHandle, RegistryError> {
        match self.objects.insert(object) {
            Ok(index) => Ok(ObjectHandle(index)),
            Err(_rejected) => {
                log::warn!("object limit reached ({MAX_OBJECTS} objects)");
                Err(RegistryError::ObjectCapacity { max: MAX_OBJECTS })
            }
        }
    }

    /// Destroy a game object, returning its command buffer to the pool.
    pub fn destroy_object(
        &mut self,
        command_pool: &CommandPool,
        handle: ObjectHandle,
    ) -> Result<(), RegistryError> {
        let object = self
            .objects
            .remove(handle.0)
            .ok_or(RegistryError::UnknownObject)?;
        command_pool.free(&[object.command_buffer]);
        Ok(())
    }

    /// Destroy a mesh, releasing its buffers and texture. Refused while
    /// any live object still references the handle, so a recorded draw can
    /// never outlive the resources it binds.
    pub fn destroy_mesh(&mut self, handle: MeshHandle) -> Result<(), RegistryError> {
        let referents = self
            .objects
            .iter()
            .filter(|(_, object)| object.mesh == handle)
            .count();
        if referents > 0 {
            return Err(RegistryError::MeshInUse { objects: referents });
        }

        self.meshes
            .remove(handle.0)
            .map(drop)
            .ok_or(RegistryError::UnknownMesh)
    }

    /// Borrow a mesh.
    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle.0)
    }

    /// Borrow an object.
    pub fn object(&self, handle: ObjectHandle) -> Option<&GameObject> {
        self.objects.get(handle.0)
    }

    /// Mutably borrow an object.
    pub fn object_mut(&mut self, handle: ObjectHandle) -> Option<&mut GameObject> {
        self.objects.get_mut(handle.0)
    }

    /// Number of live objects.
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    /// Number of registered meshes.
    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    /// Iterate over live objects with their mesh resolved.
    pub(crate) fn drawable_objects(&self) -> impl Iterator<Item = (&GameObject, &Mesh)> {
        self.objects.iter().filter_map(|(_, object)| {
            self.meshes.get(object.mesh.0).map(|mesh| (object, mesh))
        })
    }

    /// Secondary command buffers of every live, visible object. Hidden
    /// objects contribute nothing.
    pub(crate) fn visible_command_buffers(&self) -> Vec<vk::CommandBuffer> {
        self.objects
            .iter()
            .filter(|(_, object)| object.visible)
            .map(|(_, object)| object.command_buffer)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_object(visible: bool) -> GameObject {
        GameObject {
            mesh: MeshHandle(0),
            position: Vector3::zeros(),
            rotation: Vector3::zeros(),
            visible,
            command_buffer: vk::CommandBuffer::null(),
        }
    }

    #[test]
    fn object_capacity_is_enforced_and_counts_unchanged() {
        let mut registry = ObjectRegistry::new();
        for _ in 0..MAX_OBJECTS {
            registry.insert_object(dummy_object(true)).unwrap();
        }
        assert_eq!(registry.live_objects(), MAX_OBJECTS);

        let result = registry.insert_object(dummy_object(true));
        assert_eq!(result, Err(RegistryError::ObjectCapacity { max: MAX_OBJECTS }));
        assert_eq!(registry.live_objects(), MAX_OBJECTS);
    }

    #[test]
    fn destroyed_slot_is_reusable() {
        let mut registry = ObjectRegistry::new();
        let first = registry.insert_object(dummy_object(true)).unwrap();
        let second = registry.insert_object(dummy_object(true)).unwrap();
        assert_ne!(first, second);

        registry.objects.remove(first.0).unwrap();
        assert_eq!(registry.live_objects(), 1);

        let third = registry.insert_object(dummy_object(true)).unwrap();
        assert_eq!(third, first);
        assert_eq!(registry.live_objects(), 2);
    }

    #[test]
    fn hidden_objects_contribute_zero_command_buffers() {
        let mut registry = ObjectRegistry::new();
        registry.insert_object(dummy_object(true)).unwrap();
        registry.insert_object(dummy_object(false)).unwrap();
        registry.insert_object(dummy_object(true)).unwrap();
        registry.insert_object(dummy_object(false)).unwrap();

        assert_eq!(registry.visible_command_buffers().len(), 2);

        // Hiding everything empties the list entirely.
        for (_, object) in registry.objects.iter_mut() {
            object.visible = false;
        }
        assert!(registry.visible_command_buffers().is_empty());
    }

    #[test]
    fn transforms_survive_in_their_slots() {
        let mut registry = ObjectRegistry::new();
        let handle = registry.insert_object(dummy_object(true)).unwrap();

        registry
            .objects
            .get_mut(handle.0)
            .unwrap()
            .position = Vector3::new(1.0, 2.0, 3.0);

        let object = registry.objects.get(handle.0).unwrap();
        assert_eq!(object.position, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn model_matrix_translates_by_position() {
        let mut object = dummy_object(true);
        object.position = Vector3::new(4.0, -2.0, 1.5);

        let model = object.model_matrix();
        assert_eq!(model[(0, 3)], 4.0);
        assert_eq!(model[(1, 3)], -2.0);
        assert_eq!(model[(2, 3)], 1.5);
    }

    #[test]
    fn model_matrix_identity_for_default_transform() {
        let object = dummy_object(true);
        assert_eq!(object.model_matrix(), Matrix4::identity());
    }
}
