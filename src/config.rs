use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::network::topics::DEFAULT_ROOMS_ROOT;
use crate::ota::auto_update::{AutoUpdateSettings, CHECK_FOR_UPDATES_INTERVAL_SECS, DEFAULT_RELEASE_BASE_URL};
use crate::version;

pub const CONFIG_NAMESPACE: &str = "espresense";
pub const CONFIG_KEY: &str = "config";
/// Largest JSON blob accepted from storage
pub const CONFIG_MAX_SIZE: usize = 2048;

const DEFAULT_ROOM: &str = "unnamed";
/// Longest room name in bytes; keeps every discovery document under its payload cap
pub const MAX_ROOM_LEN: usize = 64;
const DEFAULT_MAX_DISTANCE: u32 = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // WiFi settings
    pub wifi_ssid: String,
    pub wifi_password: String,

    // MQTT
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_password: String,

    // Placement
    pub room: String,
    pub rooms_root: String,

    // OTA settings
    pub auto_update: bool,
    pub release_base_url: String,
    /// Required for push uploads when non-empty
    pub ota_password: String,

    // Announcements
    pub discovery: bool,
    pub max_distance: u32,
    pub pir_pin: Option<u8>,
    pub radar_pin: Option<u8>,
    pub weather: bool,
}

impl Default for Config {
    fn default() -> Self {
        // Get WiFi credentials from environment variables set by build.rs
        let wifi_ssid = env!("WIFI_SSID");
        let wifi_password = env!("WIFI_PASSWORD");

        Self {
            wifi_ssid: wifi_ssid.to_string(),
            wifi_password: wifi_password.to_string(),
            mqtt_host: "mqtt.local".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_password: String::new(),
            room: DEFAULT_ROOM.to_string(),
            rooms_root: DEFAULT_ROOMS_ROOT.to_string(),
            auto_update: false,
            release_base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
            ota_password: String::new(),
            discovery: true,
            max_distance: DEFAULT_MAX_DISTANCE,
            pir_pin: None,
            radar_pin: None,
            weather: false,
        }
    }
}

impl Config {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > CONFIG_MAX_SIZE {
            anyhow::bail!("Config blob too large: {} bytes", bytes.len());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        if json.len() > CONFIG_MAX_SIZE {
            anyhow::bail!("Config too large to persist: {} bytes", json.len());
        }
        Ok(json)
    }

    /// Motion discovery only makes sense with a PIR or radar input wired up
    pub fn motion_enabled(&self) -> bool {
        self.pir_pin.is_some() || self.radar_pin.is_some()
    }

    /// Room names end up in topics, so `/`, `+` and `#` are replaced, long names are cut at
    /// [`MAX_ROOM_LEN`] bytes and blanks fall back to the default
    pub fn room_name(&self) -> String {
        let mut cleaned = String::with_capacity(MAX_ROOM_LEN);
        for c in self.room.trim().chars() {
            let c = match c {
                '/' | '+' | '#' | ' ' => '_',
                c if c.is_control() => '_',
                c => c,
            };
            if cleaned.len() + c.len_utf8() > MAX_ROOM_LEN {
                log::warn!("Room name longer than {} bytes, truncated to '{}'", MAX_ROOM_LEN, cleaned);
                break;
            }
            cleaned.push(c);
        }
        if cleaned.is_empty() {
            DEFAULT_ROOM.to_string()
        } else {
            cleaned
        }
    }

    pub fn auto_update_settings(&self) -> AutoUpdateSettings {
        AutoUpdateSettings {
            enabled: self.auto_update,
            interval_secs: CHECK_FOR_UPDATES_INTERVAL_SECS,
            release_base_url: self.release_base_url.clone(),
            firmware: version::FIRMWARE.to_string(),
            version: version::BUILD_VERSION.map(str::to_string),
        }
    }

    /// Fill empty WiFi credentials from the ones compiled in. Returns true when anything changed.
    pub fn merge_compiled_credentials(&mut self) -> bool {
        if !self.wifi_ssid.is_empty() && !self.wifi_password.is_empty() {
            return false;
        }
        let compiled = (env!("WIFI_SSID"), env!("WIFI_PASSWORD"));
        if compiled.0.is_empty() {
            return false;
        }
        log::warn!("Stored WiFi credentials empty, using compiled defaults: SSID='{}'", compiled.0);
        self.wifi_ssid = compiled.0.to_string();
        self.wifi_password = compiled.1.to_string();
        true
    }
}
