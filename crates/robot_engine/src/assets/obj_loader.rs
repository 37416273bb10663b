//! OBJ model decoding into a single vertex/index list

use std::path::Path;

use crate::assets::AssetError;
use crate::render::vertex::Vertex;

/// Decode an OBJ file into one vertex/index mesh.
///
/// The engine draws one mesh per model file; any other mesh count is a
/// fatal load error.
pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<(Vec<Vertex>, Vec<u32>), AssetError> {
    let path = path.as_ref();
    let (models, _materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)?;

    if models.len() != 1 {
        return Err(AssetError::MeshCount {
            path: path.display().to_string(),
            count: models.len(),
        });
    }

    let mesh = &models[0].mesh;
    let vertex_count = mesh.positions.len() / 3;
    let has_texcoords = !mesh.texcoords.is_empty();

    let mut vertices = Vec::with_capacity(vertex_count);
    for i in 0..vertex_count {
        let tex_coord = if has_texcoords {
            // OBJ texture origin is bottom-left; flip V for Vulkan.
            [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
        } else {
            [0.0, 0.0]
        };

        vertices.push(Vertex {
            position: [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ],
            color: [0.0, 0.0, 0.0],
            tex_coord,
        });
    }

    log::debug!(
        "loaded model {}: {} vertices, {} indices",
        path.display(),
        vertices.len(),
        mesh.indices.len()
    );

    Ok((vertices, mesh.indices.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_obj(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn single_mesh_obj_decodes() {
        let path = write_temp_obj(
            "robot_engine_tri.obj",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nf 1/1 2/2 3/3\n",
        );
        let (vertices, indices) = load_obj(&path).unwrap();
        assert_eq!(vertices.len(), 3);
        assert_eq!(indices.len(), 3);
        // V is flipped for Vulkan.
        assert_eq!(vertices[2].tex_coord[1], 0.0);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn multi_mesh_obj_is_rejected() {
        let path = write_temp_obj(
            "robot_engine_two.obj",
            concat!(
                "o first\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
                "o second\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n",
            ),
        );
        let result = load_obj(&path);
        assert!(matches!(result, Err(AssetError::MeshCount { count: 2, .. })));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_obj("/definitely/not/here.obj").is_err());
    }
}
