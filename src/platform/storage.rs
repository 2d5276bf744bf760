use anyhow::Result;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs};
use esp_idf_sys::{
    esp, nvs_flash_erase, nvs_flash_init, ESP_ERR_NVS_NEW_VERSION_FOUND, ESP_ERR_NVS_NO_FREE_PAGES,
};

use crate::config::{Config, CONFIG_KEY, CONFIG_MAX_SIZE, CONFIG_NAMESPACE};
use crate::system::{StorageError, StorageVolume};

/// The default NVS partition as seen by the failsafe, before any service holds it
pub struct NvsVolume;

impl StorageVolume for NvsVolume {
    fn format(&mut self) -> Result<(), StorageError> {
        esp!(unsafe { nvs_flash_erase() }).map_err(|e| StorageError::Format(e.to_string()))
    }

    fn mount(&mut self) -> Result<(), StorageError> {
        let result = unsafe { nvs_flash_init() };
        if result == ESP_ERR_NVS_NO_FREE_PAGES as i32 || result == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
            log::warn!("NVS partition truncated or from a newer layout, erasing");
            self.format().map_err(|e| StorageError::Mount(e.to_string()))?;
            return esp!(unsafe { nvs_flash_init() }).map_err(|e| StorageError::Mount(e.to_string()));
        }
        esp!(result).map_err(|e| StorageError::Mount(e.to_string()))
    }
}

/// JSON config blob in its own NVS namespace
#[derive(Clone)]
pub struct ConfigStore {
    partition: EspDefaultNvsPartition,
}

impl ConfigStore {
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        Self { partition }
    }

    pub fn load_or_default(&self) -> Result<Config> {
        match self.load() {
            Ok(mut config) => {
                log::info!("Loaded configuration from NVS");

                // If NVS has empty WiFi credentials, use the compiled-in ones
                if config.merge_compiled_credentials() {
                    if let Err(e) = self.save(&config) {
                        log::warn!("Failed to save updated config with WiFi credentials: {:?}", e);
                    }
                }
                Ok(config)
            }
            Err(e) => {
                log::warn!("Failed to load config from NVS: {:?}, using defaults", e);
                let config = Config::default();

                if let Err(save_err) = self.save(&config) {
                    log::warn!("Failed to save default config to NVS: {:?}", save_err);
                }
                Ok(config)
            }
        }
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        let mut nvs = EspNvs::new(self.partition.clone(), CONFIG_NAMESPACE, true)?;
        nvs.set_blob(CONFIG_KEY, &config.to_json()?)?;
        log::info!("Configuration saved to NVS");
        Ok(())
    }

    fn load(&self) -> Result<Config> {
        let nvs = EspNvs::new(self.partition.clone(), CONFIG_NAMESPACE, true)?;

        let mut buf = vec![0u8; CONFIG_MAX_SIZE];
        let data = nvs
            .get_blob(CONFIG_KEY, &mut buf)?
            .ok_or_else(|| anyhow::anyhow!("Config not found in NVS"))?;

        Config::from_json(data)
    }
}
