use anyhow::Result;

#[cfg(target_os = "espidf")]
use esp_idf_sys as _; // Binstart

// Generate ESP-IDF app descriptor
#[cfg(target_os = "espidf")]
#[allow(unexpected_cfgs)]
mod app_desc {
    esp_idf_sys::esp_app_desc!();
}

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    presence_node::platform::firmware::run()
}

/// Host build: walk the boot and announcement path against a log-only broker
#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    use presence_node::boot_diagnostics;
    use presence_node::config::Config;
    use presence_node::network::{ConnectivityAnnouncer, LogPublisher, Telemetry};
    use presence_node::system::{DeviceIdentity, SystemInfo};
    use presence_node::{logging, version};

    logging::init_logger().map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;
    if let Ok(level) = std::env::var("PRESENCE_LOG") {
        if !logging::set_max_level_from_str(&level) {
            log::warn!("Unknown log level '{}'", level);
        }
    }

    let system_info = SystemInfo::new();
    log::info!("{}", version::version_info());
    let reset_cause = boot_diagnostics::log_boot_reason(1);

    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json(&std::fs::read(&path)?)?,
        None => Config::default(),
    };
    let identity = DeviceIdentity::new([0x02, 0, 0, 0, 0, 0x01], config.room_name(), "host");

    let settings = config.auto_update_settings();
    log::info!(
        "Auto update {} ({})",
        if settings.enabled { "enabled" } else { "disabled" },
        settings.artifact_url()
    );

    let mut announcer = ConnectivityAnnouncer::new(LogPublisher::default(), &identity, &config)?;
    if !announcer.on_connected() {
        log::warn!("Announcements incomplete");
    }
    announcer.publish_telemetry(&Telemetry {
        ip: "127.0.0.1".to_string(),
        uptime: system_info.uptime_secs(),
        firmware: version::FIRMWARE.to_string(),
        version: version::display_version().to_string(),
        reset_reason: reset_cause.label().to_string(),
        reconnect_tries: 0,
        tele_fails: 0,
        free_heap: 0,
    });

    log::info!("Dry run published {} messages in {}", announcer.publisher().published, system_info.format_uptime());
    Ok(())
}
