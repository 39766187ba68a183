// Centralized version information for the "currently running image"
// response.

// Display version - this is what users see in the status page
pub const DISPLAY_VERSION: &str = "v1.0";

// Cargo package version from Cargo.toml
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

// Full version string including Cargo version
pub fn full_version() -> String {
    format!("{} ({})", DISPLAY_VERSION, CARGO_VERSION)
}
