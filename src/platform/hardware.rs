use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, Input, PinDriver, Pull};

use crate::system::ButtonInput;

/// Boot button, active low with the internal pull-up
pub struct BootButton {
    pin: PinDriver<'static, AnyIOPin, Input>,
}

impl BootButton {
    pub fn new(pin: AnyIOPin) -> Result<Self> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        Ok(Self { pin })
    }
}

impl ButtonInput for BootButton {
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low()
    }
}

/// Raw ROM reset reason of CPU 0
pub fn reset_code() -> u32 {
    unsafe { esp_idf_sys::esp_rom_get_reset_reason(0) as u32 }
}

pub fn mac_address() -> [u8; 6] {
    let mut mac = [0u8; 6];
    let result = unsafe { esp_idf_sys::esp_read_mac(mac.as_mut_ptr(), esp_idf_sys::esp_mac_type_t_ESP_MAC_WIFI_STA) };
    if result != esp_idf_sys::ESP_OK {
        log::warn!("Failed to read station MAC: {}", result);
    }
    mac
}

pub fn chip_model() -> &'static str {
    let mut info = esp_idf_sys::esp_chip_info_t::default();
    unsafe { esp_idf_sys::esp_chip_info(&mut info) };

    match info.model {
        esp_idf_sys::esp_chip_model_t_CHIP_ESP32 => "ESP32",
        esp_idf_sys::esp_chip_model_t_CHIP_ESP32S2 => "ESP32-S2",
        esp_idf_sys::esp_chip_model_t_CHIP_ESP32S3 => "ESP32-S3",
        esp_idf_sys::esp_chip_model_t_CHIP_ESP32C3 => "ESP32-C3",
        esp_idf_sys::esp_chip_model_t_CHIP_ESP32C6 => "ESP32-C6",
        _ => "ESP32-unknown",
    }
}

pub fn free_heap() -> u32 {
    unsafe { esp_idf_sys::esp_get_free_heap_size() }
}

pub fn restart() -> ! {
    log::warn!("Restarting...");
    std::thread::sleep(std::time::Duration::from_millis(1000));
    esp_idf_hal::reset::restart()
}
