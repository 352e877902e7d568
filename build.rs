use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=XILINX_XRT");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_XRT");

    // The simulator needs nothing from the host; only the `xrt` feature links
    // against the OpenCL ICD loader shipped with XRT.
    if env::var_os("CARGO_FEATURE_XRT").is_none() {
        return;
    }

    let xrt_root = env::var("XILINX_XRT").unwrap_or_else(|_| "/opt/xilinx/xrt".to_string());
    let lib_dir = PathBuf::from(&xrt_root).join("lib");
    if !lib_dir.exists() {
        println!(
            "cargo:warning=XRT library directory not found at {}. Relying on the system linker path.",
            lib_dir.display()
        );
    }
    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=dylib=OpenCL");
}
