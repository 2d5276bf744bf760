// Centralized version information

// Release artifact name, e.g. "esp32" -> `esp32.bin` on the release page
pub const FIRMWARE: &str = match option_env!("PRESENCE_FIRMWARE") {
    Some(name) => name,
    None => "esp32",
};

// Cargo package version from Cargo.toml
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

// Release version token stamped by CI (e.g. "v3.1.0"). Local builds leave it unset; an empty stamp counts as unset.
pub const BUILD_VERSION: Option<&str> = match option_env!("PRESENCE_VERSION") {
    Some(token) if !token.is_empty() => Some(token),
    _ => None,
};

// Version reported in telemetry and logs
pub fn display_version() -> &'static str {
    BUILD_VERSION.unwrap_or(CARGO_VERSION)
}

// Version info string for logging
pub fn version_info() -> String {
    match BUILD_VERSION {
        Some(token) => format!("Firmware: {}, Release: {}, Cargo: {}", FIRMWARE, token, CARGO_VERSION),
        None => format!("Firmware: {}, Release: <unset>, Cargo: {}", FIRMWARE, CARGO_VERSION),
    }
}
