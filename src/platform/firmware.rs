// Device entry point: boot diagnostics, failsafe, services, then the announcement loop

use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use super::hardware::{self, BootButton};
use super::http_client::EspReleaseClient;
use super::mqtt::{self, MqttEvent};
use super::ota_server;
use super::ota_sink::EspOtaSink;
use super::storage::{ConfigStore, NvsVolume};
use super::wifi::WifiManager;
use crate::boot_diagnostics::{self, ResetCause};
use crate::logging;
use crate::network::{AnnouncementTopics, ConnectivityAnnouncer, Telemetry};
use crate::ota::auto_update::{AutoUpdateChecker, CheckOutcome};
use crate::ota::{UpdateCoordinator, UpdateGate};
use crate::system::{prepare_storage, DeviceIdentity, FailsafeConfig, LogDisplay, SystemInfo};
use crate::version;

const TELEMETRY_INTERVAL: Duration = Duration::from_secs(60);
const AUTO_UPDATE_POLL: Duration = Duration::from_secs(10);
const WIFI_RETRY_DELAY: Duration = Duration::from_secs(5);
const AUTO_UPDATE_STACK: usize = 12 * 1024;

pub fn run() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    logging::init_logger().map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    let system_info = SystemInfo::new();
    info!("{}", version::version_info());
    let reset_cause = boot_diagnostics::log_boot_reason(hardware::reset_code());

    let peripherals = Peripherals::take()?;

    // Boot button (GPIO0) held through power-up wipes the settings
    let mut display = LogDisplay::default();
    let mut button = BootButton::new(AnyIOPin::from(peripherals.pins.gpio0))?;
    match prepare_storage(Some(&mut button), &mut NvsVolume, &mut display, &FailsafeConfig::default()) {
        Ok(outcome) => info!("Storage ready: {:?}", outcome),
        Err(e) => error!("Storage preparation failed: {}", e),
    }
    drop(button);

    let nvs = EspDefaultNvsPartition::take()?;
    let store = ConfigStore::new(nvs.clone());
    let mut config = store.load_or_default()?;

    let sys_loop = EspSystemEventLoop::take()?;
    let mut wifi = WifiManager::new(peripherals.modem, sys_loop, nvs, &config.wifi_ssid, &config.wifi_password)?;
    while let Err(e) = wifi.connect() {
        warn!("WiFi connect failed: {:?}, retrying in {:?}", e, WIFI_RETRY_DELAY);
        thread::sleep(WIFI_RETRY_DELAY);
    }

    let identity = DeviceIdentity::new(hardware::mac_address(), config.room_name(), hardware::chip_model());
    info!("Device {} ({}) in room {}", identity.mac(), identity.chip_model(), identity.room());

    // One gate for both update paths; the BLE scanner polls `suppression`
    let gate = UpdateGate::new();
    let suppression = gate.suppression();
    let coordinator = UpdateCoordinator::new(gate);

    let _server = ota_server::start(coordinator.clone(), &config.ota_password)?;
    spawn_auto_update(&config, coordinator.clone(), system_info)?;

    let client_id = format!("espresense-{}", identity.mac().replace(':', ""));
    let topics = AnnouncementTopics::new(&config.rooms_root, identity.room());
    let (publisher, events) = mqtt::connect(&config, &client_id, &topics)?;
    let mut announcer = ConnectivityAnnouncer::new(publisher, &identity, &config)?;

    loop {
        match events.recv_timeout(TELEMETRY_INTERVAL) {
            Ok(MqttEvent::Connected) => {
                for topic in topics.subscriptions() {
                    if let Err(e) = announcer.publisher_mut().subscribe(topic) {
                        warn!("Subscribe to {} failed: {:?}", topic, e);
                    }
                }
                if !announcer.on_connected() {
                    warn!("Announcements incomplete, retrying on next reconnect");
                }
            }
            Ok(MqttEvent::Disconnected) => announcer.on_disconnected(),
            Ok(MqttEvent::Message { topic, payload }) => {
                if let Some(max_distance) = announcer.handle_message(&topic, &payload) {
                    config.max_distance = max_distance;
                    if let Err(e) = store.save(&config) {
                        warn!("Failed to persist max distance: {:?}", e);
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !wifi.is_connected() {
                    warn!("WiFi lost, reconnecting");
                    if let Err(e) = wifi.connect() {
                        warn!("WiFi reconnect failed: {:?}", e);
                    }
                    continue;
                }
                // Stay quiet while an image is being flashed
                if !announcer.is_online() || suppression.is_sensing_suppressed() {
                    continue;
                }
                announcer.publish_telemetry(&telemetry(&wifi, &system_info, reset_cause));
            }
            Err(RecvTimeoutError::Disconnected) => anyhow::bail!("MQTT event channel closed"),
        }
    }
}

fn spawn_auto_update(config: &crate::config::Config, coordinator: UpdateCoordinator, system_info: SystemInfo) -> Result<()> {
    let settings = config.auto_update_settings();
    if !settings.enabled {
        info!("Auto update disabled");
        return Ok(());
    }

    let sink = EspOtaSink::new()?;
    let mut checker = AutoUpdateChecker::new(settings, EspReleaseClient::new(), sink, coordinator);
    info!("Auto update checking {} every {}s", checker.settings().artifact_url(), checker.settings().interval_secs);

    thread::Builder::new()
        .name("auto-update".to_string())
        .stack_size(AUTO_UPDATE_STACK)
        .spawn(move || loop {
            match checker.poll(system_info.uptime_secs()) {
                CheckOutcome::Succeeded(report) => {
                    info!("Pulled {} bytes ({}), restarting into new image", report.bytes, report.digest_hex());
                    hardware::restart();
                }
                CheckOutcome::Failed(e) => warn!("Auto update failed ({}): {}", e.category(), e),
                CheckOutcome::Busy(origin) => info!("Auto update skipped, {} update in progress", origin),
                CheckOutcome::Disabled | CheckOutcome::NotDue | CheckOutcome::NoUpdateAvailable => {}
            }
            thread::sleep(AUTO_UPDATE_POLL);
        })?;
    Ok(())
}

fn telemetry(wifi: &WifiManager, system_info: &SystemInfo, reset_cause: ResetCause) -> Telemetry {
    Telemetry {
        ip: wifi.ip().unwrap_or_default(),
        uptime: system_info.uptime_secs(),
        firmware: version::FIRMWARE.to_string(),
        version: version::display_version().to_string(),
        reset_reason: reset_cause.label().to_string(),
        // Filled in by the announcer
        reconnect_tries: 0,
        tele_fails: 0,
        free_heap: hardware::free_heap(),
    }
}
