/// Device identity - fixed for the life of the process, feeds every announcement id

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    mac: String,
    room: String,
    chip_model: String,
}

impl DeviceIdentity {
    pub fn new(mac: [u8; 6], room: impl Into<String>, chip_model: impl Into<String>) -> Self {
        Self {
            mac: format_mac(mac),
            room: room.into(),
            chip_model: chip_model.into(),
        }
    }

    /// `AA:BB:CC:DD:EE:FF`
    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn chip_model(&self) -> &str {
        &self.chip_model
    }

    /// Name shown for the device in the home-automation hub
    pub fn device_name(&self) -> String {
        format!("ESPresense {}", self.room)
    }

    /// Stable id of one capability: address plus suffix
    pub fn unique_id(&self, suffix: &str) -> String {
        format!("{}_{}", self.mac, suffix)
    }
}

pub fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_formatting() {
        assert_eq!(format_mac([0x24, 0x0a, 0xc4, 0x00, 0x01, 0xff]), "24:0A:C4:00:01:FF");
    }

    #[test]
    fn test_identity_derived_names() {
        let id = DeviceIdentity::new([1, 2, 3, 4, 5, 6], "Kitchen", "ESP32-D0WDQ6");
        assert_eq!(id.device_name(), "ESPresense Kitchen");
        assert_eq!(id.unique_id("motion"), "01:02:03:04:05:06_motion");
        assert_eq!(id.chip_model(), "ESP32-D0WDQ6");
    }
}
