//! Asset decoding: OBJ models and image files
//!
//! Decoding is delegated to `tobj` and `image`; this module only shapes the
//! results into the engine's vertex/index and RGBA layouts.

pub mod obj_loader;
pub mod texture_data;

pub use obj_loader::load_obj;
pub use texture_data::TextureData;

use thiserror::Error;

/// Asset loading errors; all are fatal-tier for the caller.
#[derive(Error, Debug)]
pub enum AssetError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Image file could not be decoded
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),

    /// Model file could not be decoded
    #[error("model decode failed: {0}")]
    Model(#[from] tobj::LoadError),

    /// Model files must contain exactly one mesh
    #[error("{path} contains {count} meshes, expected exactly 1")]
    MeshCount {
        /// Offending path.
        path: String,
        /// Number of meshes found.
        count: usize,
    },
}
