//! Engine facade: window, registry, renderer, camera, and the main loop

use std::time::Instant;

use thiserror::Error;

use crate::assets::{self, AssetError, TextureData};
use crate::config::{ConfigError, EngineConfig};
use crate::render::camera::Camera;
use crate::render::vertex::Vertex;
use crate::render::vulkan::context::VulkanError;
use crate::render::vulkan::registry::{MeshHandle, ObjectHandle, ObjectRegistry, RegistryError};
use crate::render::vulkan::renderer::VulkanRenderer;
use crate::window::{Window, WindowError};

/// Top-level engine errors.
///
/// Library code only ever returns these; deciding to log-and-exit is the
/// binary's job.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Windowing failure
    #[error(transparent)]
    Window(#[from] WindowError),

    /// Vulkan failure (fatal tier)
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    /// Asset decoding failure
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// Configuration failure
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registry capacity or handle failure
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Per-tick view of the engine handed to the game.
pub struct TickContext<'a> {
    /// Mesh and object tables.
    pub objects: &'a mut ObjectRegistry,
    /// Camera driving the next frame's view/projection.
    pub camera: &'a mut Camera,
    /// Milliseconds since the previous tick.
    pub elapsed_ms: f64,
    exit: &'a mut bool,
}

impl TickContext<'_> {
    /// Ask the engine to leave the main loop after this tick.
    pub fn request_exit(&mut self) {
        *self.exit = true;
    }
}

/// Host-supplied game callbacks, invoked from the main loop.
pub trait GameHooks {
    /// Called once per iteration, before command recording.
    fn on_tick(&mut self, ctx: &mut TickContext<'_>);

    /// Called for every key event.
    fn on_key(&mut self, key: glfw::Key, action: glfw::Action) {
        let _ = (key, action);
    }
}

/// The engine: owns every component and drives the frame loop.
///
/// Declaration order doubles as drop order: the registry's GPU resources go
/// before the renderer, and the surface (inside the renderer) before the
/// window.
pub struct Engine {
    registry: ObjectRegistry,
    renderer: VulkanRenderer,
    window: Window,
    camera: Camera,
}

impl Engine {
    /// Create the window and bring up the rendering stack.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut window = Window::new(
            &config.window.title,
            config.window.width,
            config.window.height,
        )?;
        let renderer = VulkanRenderer::new(&mut window, config.shaders.clone())?;

        Ok(Self {
            registry: ObjectRegistry::new(),
            renderer,
            window,
            camera: Camera::default(),
        })
    }

    /// Camera state.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Mesh and object tables.
    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Mutable mesh and object tables.
    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    /// Load a model file and a texture file into a new mesh.
    pub fn load_model(
        &mut self,
        model_path: &str,
        texture_path: &str,
    ) -> Result<MeshHandle, EngineError> {
        let (vertices, indices) = assets::load_obj(model_path)?;
        let texture = TextureData::load(texture_path)?;
        self.create_mesh(&vertices, &indices, &texture)
    }

    /// Upload caller-built geometry and a texture into a new mesh.
    pub fn create_mesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        texture: &TextureData,
    ) -> Result<MeshHandle, EngineError> {
        // Check capacity before paying for the upload.
        if !self.registry.has_mesh_capacity() {
            log::warn!("mesh limit reached, rejecting mesh creation");
            return Err(RegistryError::MeshCapacity {
                max: crate::render::vulkan::registry::MAX_MESHES,
            }
            .into());
        }

        let mesh = self.renderer.build_mesh(vertices, indices, texture)?;
        Ok(self.registry.insert_mesh(mesh)?)
    }

    /// Create a game object drawing `mesh`.
    pub fn create_object(&mut self, mesh: MeshHandle) -> Result<ObjectHandle, EngineError> {
        Ok(self
            .registry
            .create_object(self.renderer.command_pool(), mesh)?)
    }

    /// Destroy a game object, freeing its command buffer.
    pub fn destroy_object(&mut self, handle: ObjectHandle) -> Result<(), EngineError> {
        // The object's buffer may still be referenced by in-flight work.
        self.renderer.wait_idle();
        Ok(self
            .registry
            .destroy_object(self.renderer.command_pool(), handle)?)
    }

    /// Destroy a mesh. Fails while objects still reference it.
    pub fn destroy_mesh(&mut self, handle: MeshHandle) -> Result<(), EngineError> {
        self.renderer.wait_idle();
        Ok(self.registry.destroy_mesh(handle)?)
    }

    /// Run the main loop until the window closes or the game requests
    /// exit. Drains the GPU before returning.
    pub fn run(&mut self, hooks: &mut dyn GameHooks) -> Result<(), EngineError> {
        let mut last_tick = Instant::now();

        while !self.window.should_close() {
            for event in self.window.drain_events() {
                match event {
                    glfw::WindowEvent::FramebufferSize(width, height) => {
                        // Zero-sized events (minimize) are ignored.
                        if width > 0 && height > 0 {
                            self.renderer.mark_surface_stale();
                        }
                    }
                    glfw::WindowEvent::Close => {
                        self.window.set_should_close(true);
                    }
                    glfw::WindowEvent::Key(key, _, action, _) => {
                        hooks.on_key(key, action);
                    }
                    _ => {}
                }
            }

            let now = Instant::now();
            let elapsed_ms = now.duration_since(last_tick).as_secs_f64() * 1000.0;
            last_tick = now;

            let mut exit = false;
            hooks.on_tick(&mut TickContext {
                objects: &mut self.registry,
                camera: &mut self.camera,
                elapsed_ms,
                exit: &mut exit,
            });
            if exit {
                self.window.set_should_close(true);
                continue;
            }

            self.renderer
                .draw_frame(&self.registry, &self.camera, &self.window)?;
        }

        self.renderer.wait_idle();
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Registry resources drop right after this; the GPU must be done
        // with them first.
        self.renderer.wait_idle();
    }
}
