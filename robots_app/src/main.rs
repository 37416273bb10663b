//! Robots demo: drive a robot around a heightmap terrain and shoot.
//!
//! All fatal-tier errors bubble up to `main`, which logs them and exits
//! nonzero; nothing below this file terminates the process.

mod bullet;
mod game;
mod robot;
mod terrain;

use serde::{Deserialize, Serialize};

use game::Game;
use robot_engine::{Engine, EngineConfig};

/// Asset file locations for the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetPaths {
    /// Robot OBJ model.
    pub robot_model: String,
    /// Robot texture image.
    pub robot_texture: String,
    /// Bullet OBJ model.
    pub bullet_model: String,
    /// Bullet texture image.
    pub bullet_texture: String,
    /// Square grayscale heightmap image.
    pub heightmap: String,
    /// Terrain texture image.
    pub terrain_texture: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            robot_model: "assets/models/robot.obj".to_string(),
            robot_texture: "assets/textures/robot-texture.png".to_string(),
            bullet_model: "assets/models/bullet.obj".to_string(),
            bullet_texture: "assets/textures/bullet-texture.png".to_string(),
            heightmap: "assets/heightmaps/heightmap_small.bmp".to_string(),
            terrain_texture: "assets/textures/grass.jpg".to_string(),
        }
    }
}

/// Full application configuration: engine settings plus asset paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine (window, shaders) settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Game asset locations.
    #[serde(default)]
    pub assets: AssetPaths,
}

impl AppConfig {
    fn load_or_default(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        if std::path::Path::new(path).exists() {
            log::info!("loading config from {path}");
            Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
        } else {
            log::info!("no config at {path}, using defaults");
            Ok(Self::default())
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "robots.toml".to_string());
    let config = AppConfig::load_or_default(&config_path)?;

    let mut engine = Engine::new(&config.engine)?;
    let mut game = Game::new(&mut engine, &config.assets)?;
    engine.run(&mut game)?;

    log::info!("clean shutdown");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.assets.robot_model, AssetPaths::default().robot_model);
        assert_eq!(config.engine.window.width, 800);
    }

    #[test]
    fn asset_section_overrides_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [assets]
            robot_model = "other/robot.obj"
            robot_texture = "other/robot.png"
            bullet_model = "other/bullet.obj"
            bullet_texture = "other/bullet.png"
            heightmap = "other/map.bmp"
            terrain_texture = "other/grass.jpg"
            "#,
        )
        .unwrap();
        assert_eq!(config.assets.robot_model, "other/robot.obj");
        assert_eq!(config.engine.window.height, 600);
    }
}
