use serde::Serialize;

/// Periodic health report, published non-retained to `{room}/telemetry`.
/// The connectivity entity exposes it as its attribute set.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub ip: String,
    pub uptime: u64,
    pub firmware: String,
    pub version: String,
    pub reset_reason: String,
    /// Filled in by the announcer
    pub reconnect_tries: u32,
    /// Filled in by the announcer
    pub tele_fails: u32,
    pub free_heap: u32,
}

impl Telemetry {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
