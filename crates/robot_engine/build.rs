// build.rs
// Compiles GLSL shaders to SPIR-V when a Vulkan SDK is available.
// Builds without the SDK still succeed; shaders are loaded at runtime.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };
    if !Path::new(&glslc).exists() {
        eprintln!("warning: glslc not found at {}, shader compilation skipped", glslc);
        return;
    }

    let shader_dir = PathBuf::from("../../resources/shaders");
    let target_dir = PathBuf::from("../../target/shaders");
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: failed to create {}: {}", target_dir.display(), e);
        return;
    }

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: no shader directory at {:?}", shader_dir);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("vert" | "frag")
        );
        if !is_shader {
            continue;
        }

        let file_name = path.file_name().unwrap().to_string_lossy();
        let output = target_dir.join(format!("{}.spv", file_name));

        let status = Command::new(&glslc)
            .arg(&path)
            .arg("-o")
            .arg(&output)
            .status();

        match status {
            Ok(status) if status.success() => {
                eprintln!("info: compiled {}", file_name);
            }
            Ok(status) => {
                panic!("glslc failed on {} with {}", file_name, status);
            }
            Err(e) => {
                panic!("failed to run glslc: {}", e);
            }
        }
    }
}
