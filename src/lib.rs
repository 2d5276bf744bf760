// Presence node: update safety and connectivity coordination for an ESPresense room sensor

pub mod boot_diagnostics;
pub mod config;
pub mod logging;
pub mod network;
pub mod ota;
pub mod system;
pub mod version;

#[cfg(target_os = "espidf")]
pub mod platform;

#[cfg(test)]
mod tests;
