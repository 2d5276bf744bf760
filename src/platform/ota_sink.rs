// OTA partition writer on top of the ESP-IDF OTA API

use core::ffi::c_void;
use esp_idf_sys::{
    esp_ota_abort, esp_ota_begin, esp_ota_end, esp_ota_get_next_update_partition, esp_ota_handle_t,
    esp_ota_set_boot_partition, esp_ota_write, esp_partition_t, ESP_ERR_OTA_VALIDATE_FAILED, ESP_OK,
    OTA_SIZE_UNKNOWN,
};

use crate::ota::{FirmwareSink, UpdateError};

pub struct EspOtaSink {
    update_partition: *const esp_partition_t,
    ota_handle: Option<esp_ota_handle_t>,
}

// The partition pointer refers to the static partition table
unsafe impl Send for EspOtaSink {}

impl EspOtaSink {
    pub fn new() -> Result<Self, UpdateError> {
        let update_partition = unsafe { esp_ota_get_next_update_partition(core::ptr::null()) };
        if update_partition.is_null() {
            return Err(UpdateError::Begin("no OTA update partition".into()));
        }

        Ok(Self {
            update_partition,
            ota_handle: None,
        })
    }
}

impl FirmwareSink for EspOtaSink {
    fn begin(&mut self, total: Option<usize>) -> Result<(), UpdateError> {
        // A previous attempt that never finished
        self.abort();

        let mut handle: esp_ota_handle_t = 0;
        let size = total.unwrap_or(OTA_SIZE_UNKNOWN as usize);
        let result = unsafe { esp_ota_begin(self.update_partition, size as _, &mut handle as *mut _) };
        if result != ESP_OK {
            return Err(UpdateError::Begin(format!("esp_ota_begin failed: {}", result)));
        }

        self.ota_handle = Some(handle);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), UpdateError> {
        let handle = self
            .ota_handle
            .ok_or_else(|| UpdateError::Receive("write without begin".into()))?;

        let result = unsafe { esp_ota_write(handle, chunk.as_ptr() as *const c_void, chunk.len() as _) };
        if result != ESP_OK {
            return Err(UpdateError::Receive(format!("esp_ota_write failed: {}", result)));
        }
        Ok(())
    }

    fn complete(&mut self) -> Result<(), UpdateError> {
        let handle = self
            .ota_handle
            .take()
            .ok_or_else(|| UpdateError::End("complete without begin".into()))?;

        let result = unsafe { esp_ota_end(handle) };
        if result == ESP_ERR_OTA_VALIDATE_FAILED as i32 {
            return Err(UpdateError::End("image validation failed".into()));
        } else if result != ESP_OK {
            return Err(UpdateError::End(format!("esp_ota_end failed: {}", result)));
        }

        let result = unsafe { esp_ota_set_boot_partition(self.update_partition) };
        if result != ESP_OK {
            return Err(UpdateError::End(format!("esp_ota_set_boot_partition failed: {}", result)));
        }
        Ok(())
    }

    fn abort(&mut self) {
        if let Some(handle) = self.ota_handle.take() {
            unsafe {
                esp_ota_abort(handle);
            }
        }
    }
}

impl Drop for EspOtaSink {
    fn drop(&mut self) {
        self.abort();
    }
}
