//! Build script: embeds the git hash for the version string and runs
//! pre-flight checks for GPU feature flags before whisper-rs-sys compiles.

use std::process::Command;

fn main() {
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        require_tool(
            "nvcc",
            &["--version"],
            "CUDA toolkit not found. Install it from \
             https://developer.nvidia.com/cuda-downloads or build without \
             the 'cuda' feature.",
        );
    }
    if cfg!(feature = "vulkan") {
        require_tool(
            "vulkaninfo",
            &["--summary"],
            "Vulkan SDK not found. Install it from https://vulkan.lunarg.com/ \
             or build without the 'vulkan' feature.",
        );
    }
    if cfg!(feature = "hipblas") {
        require_tool(
            "rocminfo",
            &[],
            "ROCm not found. Install it from https://rocm.docs.amd.com/ \
             or build without the 'hipblas' feature.",
        );
    }
    if cfg!(feature = "openblas") {
        check_openblas();
    }
}

/// Fail the build early, with a readable message, when a GPU toolchain the
/// selected feature needs is missing. whisper-rs-sys errors are much harder
/// to diagnose.
fn require_tool(tool: &str, args: &[&str], message: &str) {
    if Command::new(tool).args(args).output().is_err() {
        panic!("\n\n`{}` is not installed: {}\n", tool, message);
    }
    println!("cargo::warning={} detected", tool);
}

fn check_openblas() {
    let pkg_config_ok = Command::new("pkg-config")
        .args(["--exists", "openblas"])
        .status()
        .is_ok_and(|s| s.success());

    let lib_exists = || {
        ["/usr/lib/x86_64-linux-gnu", "/usr/lib", "/usr/lib64"]
            .iter()
            .any(|dir| std::path::Path::new(dir).join("libopenblas.so").exists())
    };

    if !pkg_config_ok && !lib_exists() {
        panic!(
            "\n\nOpenBLAS not found. Install libopenblas-dev or build \
             without the 'openblas' feature.\n"
        );
    }
    println!("cargo::warning=OpenBLAS detected");
}
