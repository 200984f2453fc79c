fn main() {
    // Re-run build script if migrations change
    println!("cargo:rerun-if-changed=migrations");

    #[cfg(feature = "desktop")]
    tauri_build::build()
}
