// Compiles the GLSL sources in resources/shaders to SPIR-V with glslc.
//
// Output goes to target/shaders/<stem>.spv, one of the locations the default
// shader configuration searches. Set SKIP_SHADERS to build without a Vulkan
// SDK; the runtime then needs precompiled bytecode next to the binary.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_STAGES: &[&str] = &["vert", "frag"];

fn main() {
    println!("cargo:rerun-if-changed=../../resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var_os("SKIP_SHADERS").is_some() {
        println!("cargo:warning=SKIP_SHADERS set, shader compilation skipped");
        return;
    }

    let Some(glslc) = find_glslc() else {
        println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
        return;
    };

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let shader_dir = manifest_dir.join("../../resources/shaders");
    let target_dir = manifest_dir.join("../../target/shaders");

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            println!("cargo:warning=No shader directory at {}", shader_dir.display());
            return;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        panic!("Failed to create {}: {}", target_dir.display(), e);
    }

    let mut compiled = 0;
    for entry in entries.flatten() {
        let source = entry.path();
        let is_shader = source
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_STAGES.contains(&ext));
        let Some(stem) = source.file_stem() else { continue };
        if !is_shader {
            continue;
        }

        let output = target_dir.join(stem).with_extension("spv");
        if !is_stale(&source, &output) {
            continue;
        }

        let status = Command::new(&glslc)
            .arg(&source)
            .arg("-o")
            .arg(&output)
            .status()
            .unwrap_or_else(|e| panic!("Failed to run {}: {}", glslc.display(), e));

        if !status.success() {
            panic!("glslc failed for {} ({})", source.display(), status);
        }
        compiled += 1;
    }

    if compiled > 0 {
        println!("cargo:warning=Compiled {} shader(s) into {}", compiled, target_dir.display());
    }
}

fn find_glslc() -> Option<PathBuf> {
    let sdk = env::var_os("VULKAN_SDK")?;
    let binary = if cfg!(target_os = "windows") { "Bin/glslc.exe" } else { "bin/glslc" };
    let glslc = Path::new(&sdk).join(binary);

    if glslc.exists() {
        Some(glslc)
    } else {
        panic!("glslc not found at {}", glslc.display());
    }
}

fn is_stale(source: &Path, output: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(source), modified(output)) {
        (Some(src), Some(out)) => src > out,
        _ => true,
    }
}
