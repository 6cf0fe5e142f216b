use std::env;

// Take the value from the build environment if the packager provided one
fn build_setting(name: &str, default: &str) -> String {
    println!("cargo:rerun-if-env-changed={name}");
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn main() {
    let monitor_bin = build_setting("MSHELL_MONITOR_BIN", "metrics");
    let monitor_config = build_setting("MSHELL_MONITOR_CONFIG", "/tmp/metrics_config.json");

    println!("cargo:rustc-env=MSHELL_MONITOR_BIN={monitor_bin}");
    println!("cargo:rustc-env=MSHELL_MONITOR_CONFIG={monitor_config}");
    println!("cargo:rerun-if-changed=build.rs");
}
