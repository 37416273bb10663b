//! Vulkan rendering backend
//!
//! Low-level wrappers follow a strict ownership rule: every handle is
//! created and destroyed by exactly one RAII type, in reverse dependency
//! order.

/// Buffers, memory selection, and the staged upload path
pub mod buffer;
/// Command pool and one-time submissions
pub mod commands;
/// Instance, adapter selection, logical device
pub mod context;
/// Descriptor layout, pool, and per-mesh sets
pub mod descriptor;
/// Framebuffers and the depth buffer
pub mod framebuffer;
/// Mesh and game-object tables
pub mod registry;
/// Render pass
pub mod render_pass;
/// Frame orchestration
pub mod renderer;
/// SPIR-V modules and the graphics pipeline
pub mod shader;
/// Swapchain lifecycle
pub mod swapchain;
/// Fences and semaphores
pub mod sync;
/// Texture upload
pub mod texture;

pub use context::{VulkanContext, VulkanError, VulkanResult};
pub use registry::{
    GameObject, Mesh, MeshHandle, ObjectHandle, ObjectRegistry, RegistryError, MAX_MESHES,
    MAX_OBJECTS,
};
pub use renderer::VulkanRenderer;
