//! # robot_engine
//!
//! A small Vulkan game engine: staged resource uploads, bounded mesh and
//! object tables, per-object secondary command buffers, and a single-fence
//! frame loop with swapchain recreation on resize.
//!
//! The host registers meshes and objects, mutates transforms from a
//! [`GameHooks`] tick callback, and the engine turns the tables into a
//! consistent GPU frame each iteration:
//!
//! ```rust,no_run
//! use robot_engine::{Engine, EngineConfig, GameHooks, TickContext};
//!
//! struct MyGame;
//!
//! impl GameHooks for MyGame {
//!     fn on_tick(&mut self, ctx: &mut TickContext<'_>) {
//!         // move objects, steer the camera
//!         let _ = ctx.elapsed_ms;
//!     }
//! }
//!
//! fn main() -> Result<(), robot_engine::EngineError> {
//!     let config = EngineConfig::default();
//!     let mut engine = Engine::new(&config)?;
//!     let mesh = engine.load_model("assets/models/robot.obj", "assets/textures/robot.png")?;
//!     let _object = engine.create_object(mesh)?;
//!     engine.run(&mut MyGame)
//! }
//! ```

/// Asset decoding (OBJ, images)
pub mod assets;
/// TOML configuration
pub mod config;
/// Slot arena used by the registry and reusable by hosts
pub mod pool;
/// Rendering core
pub mod render;
/// GLFW window wrapper
pub mod window;

mod engine;

pub use config::{ConfigError, EngineConfig, ShaderConfig, WindowConfig};
pub use engine::{Engine, EngineError, GameHooks, TickContext};
pub use pool::SlotPool;
pub use render::camera::Camera;
pub use render::vertex::Vertex;
pub use render::vulkan::{
    GameObject, MeshHandle, ObjectHandle, ObjectRegistry, RegistryError, MAX_MESHES, MAX_OBJECTS,
};
pub use window::{Window, WindowError};
