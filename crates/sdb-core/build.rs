//! Build script for sdb-core
//!
//! This script checks system requirements before compilation:
//! - Minimum Rust version (Edition 2021 = Rust 1.56.0+)
//! - Target operating system (the process controller is Linux-only)
//!
//! ## Requirements
//!
//! - **Rust**: Edition 2021 (Rust 1.56.0 or newer)
//! - **Linux**: `ptrace(2)` and `waitpid(2)`; some distributions restrict
//!   `PTRACE_ATTACH` through Yama (`/proc/sys/kernel/yama/ptrace_scope`)

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::new(1, 56, 0);

        if rustc_version < min_rust_version {
            panic!(
                "sdb-core requires Rust {} or newer (Edition 2021), found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // Some build environments hide rustc from build scripts
        println!("cargo:warning=could not verify Rust version");
    }

    // CARGO_CFG_TARGET_OS describes the target, not the host running this script
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os != "linux" {
        println!(
            "cargo:warning=sdb-core only provides process control on Linux (target os: {})",
            if target_os.is_empty() { "unknown" } else { &target_os }
        );
    }

    #[cfg(target_os = "linux")]
    check_ptrace_scope();
}

/// Warn when Yama restricts attaching to non-descendant processes.
///
/// Launching still works under every scope except 3, so this is only a hint.
#[cfg(target_os = "linux")]
fn check_ptrace_scope()
{
    let Ok(scope) = std::fs::read_to_string("/proc/sys/kernel/yama/ptrace_scope") else {
        return;
    };

    match scope.trim() {
        "0" | "1" => {}
        "2" => println!("cargo:warning=ptrace_scope is 2: attaching requires CAP_SYS_PTRACE"),
        "3" => println!("cargo:warning=ptrace_scope is 3: ptrace is disabled on this host"),
        other => println!("cargo:warning=unrecognised ptrace_scope value: {other}"),
    }
}
