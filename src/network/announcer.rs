// Availability and discovery announcements
//
// Everything here is retained and safe to republish, so the whole set is simply sent again on
// every reconnect. A failed publish is logged and reported as `false`, never escalated.

use super::discovery::{Capability, DiscoveryCatalog, DiscoveryError};
use super::publisher::{Publisher, QoS};
use super::retry::RetryBudget;
use super::telemetry::Telemetry;
use super::topics::AnnouncementTopics;
use crate::config::Config;
use crate::system::DeviceIdentity;

pub const ONLINE_PAYLOAD: &[u8] = b"online";
pub const OFFLINE_PAYLOAD: &[u8] = b"offline";

pub struct ConnectivityAnnouncer<P: Publisher> {
    publisher: P,
    topics: AnnouncementTopics,
    catalog: DiscoveryCatalog,
    discovery: bool,
    max_distance: u32,
    retry: RetryBudget,
    online: bool,
    reconnect_tries: u32,
    tele_fails: u32,
}

impl<P: Publisher> ConnectivityAnnouncer<P> {
    pub fn new(publisher: P, identity: &DeviceIdentity, config: &Config) -> Result<Self, DiscoveryError> {
        let topics = AnnouncementTopics::new(&config.rooms_root, identity.room());

        let catalog = if config.discovery {
            let mut enabled = vec![Capability::Connectivity, Capability::MaxDistance];
            if config.motion_enabled() {
                enabled.push(Capability::Motion);
            }
            if config.weather {
                enabled.push(Capability::Weather);
            }
            DiscoveryCatalog::build(identity, &topics.rooms, &enabled)?
        } else {
            DiscoveryCatalog::default()
        };

        Ok(Self {
            publisher,
            topics,
            catalog,
            discovery: config.discovery,
            max_distance: config.max_distance,
            retry: RetryBudget::default(),
            online: false,
            reconnect_tries: 0,
            tele_fails: 0,
        })
    }

    pub fn with_retry(mut self, retry: RetryBudget) -> Self {
        self.retry = retry;
        self
    }

    pub fn topics(&self) -> &AnnouncementTopics {
        &self.topics
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn reconnect_tries(&self) -> u32 {
        self.reconnect_tries
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    /// `online` on the status topic, then the current max distance. Both are always attempted.
    pub fn announce_online(&mut self) -> bool {
        let status = self
            .retry
            .publish(&mut self.publisher, &self.topics.status, QoS::AtLeastOnce, true, ONLINE_PAYLOAD)
            .is_ok();
        let distance = self.publish_max_distance();
        if !(status && distance) {
            log::warn!("Online announcement incomplete (status={}, max_distance={})", status, distance);
        }
        status && distance
    }

    /// Publish every document of one capability. Disabled capabilities succeed without publishing.
    pub fn announce_discovery(&mut self, capability: Capability) -> bool {
        if !self.discovery {
            return true;
        }
        if self.catalog.rejected().contains(&capability) {
            log::error!("Discovery for {} unavailable, document exceeds payload limit", capability);
            return false;
        }
        if !self.catalog.is_enabled(capability) {
            log::debug!("Discovery for {} skipped, not enabled", capability);
            return true;
        }

        let mut ok = true;
        for doc in self.catalog.documents_for(capability) {
            // Each document gets its own budget, a failure does not stop the rest
            ok &= self
                .retry
                .publish(&mut self.publisher, &doc.topic, QoS::AtMostOnce, true, doc.as_bytes())
                .is_ok();
        }
        if !ok {
            log::warn!("Discovery for {} failed, will retry on next reconnect", capability);
        }
        ok
    }

    pub fn send_discovery_connectivity(&mut self) -> bool {
        self.announce_discovery(Capability::Connectivity)
    }

    pub fn send_discovery_motion(&mut self) -> bool {
        self.announce_discovery(Capability::Motion)
    }

    pub fn send_discovery_max_distance(&mut self) -> bool {
        self.announce_discovery(Capability::MaxDistance)
    }

    pub fn send_discovery_weather(&mut self) -> bool {
        self.announce_discovery(Capability::Weather)
    }

    /// Full cycle after the broker session comes up
    pub fn on_connected(&mut self) -> bool {
        log::info!("MQTT connected after {} reconnect tries", self.reconnect_tries);
        self.online = true;
        self.reconnect_tries = 0;

        let mut ok = self.announce_online();
        for capability in Capability::ALL {
            ok &= self.announce_discovery(capability);
        }
        ok
    }

    pub fn on_disconnected(&mut self) {
        if self.online {
            log::warn!("MQTT disconnected");
        }
        self.online = false;
        self.reconnect_tries = self.reconnect_tries.saturating_add(1);
    }

    /// Single non-retained attempt, failures are only counted
    pub fn publish_telemetry(&mut self, telemetry: &Telemetry) -> bool {
        let report = Telemetry {
            reconnect_tries: self.reconnect_tries,
            tele_fails: self.tele_fails,
            ..telemetry.clone()
        };

        let sent = match report.to_json() {
            Ok(json) => match self.publisher.publish(&self.topics.telemetry, QoS::AtMostOnce, false, &json) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("Telemetry publish failed: {}", e);
                    false
                }
            },
            Err(e) => {
                log::error!("Telemetry serialization failed: {}", e);
                false
            }
        };

        if !sent {
            self.tele_fails = self.tele_fails.saturating_add(1);
        }
        sent
    }

    /// Apply an inbound command. Returns the new max distance so the caller can persist it.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) -> Option<u32> {
        if topic != self.topics.max_distance_set {
            log::warn!("Ignoring message on unexpected topic {}", topic);
            return None;
        }

        let value = match core::str::from_utf8(payload).ok().and_then(|s| s.trim().parse::<u32>().ok()) {
            Some(v) => v,
            None => {
                log::warn!("Ignoring invalid max distance {:?}", String::from_utf8_lossy(payload));
                return None;
            }
        };

        log::info!("Max distance set to {}", value);
        self.max_distance = value;
        self.publish_max_distance();
        Some(value)
    }

    fn publish_max_distance(&mut self) -> bool {
        let value = self.max_distance.to_string();
        self.retry
            .publish(&mut self.publisher, &self.topics.max_distance, QoS::AtMostOnce, true, value.as_bytes())
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::RecordingPublisher;

    fn kitchen() -> DeviceIdentity {
        DeviceIdentity::new([0x24, 0x0A, 0xC4, 0x11, 0x22, 0x33], "Kitchen", "ESP32")
    }

    fn kitchen_config() -> Config {
        Config {
            room: "Kitchen".to_string(),
            discovery: true,
            pir_pin: None,
            radar_pin: None,
            weather: true,
            ..Default::default()
        }
    }

    fn announcer(publisher: RecordingPublisher, config: &Config) -> ConnectivityAnnouncer<RecordingPublisher> {
        ConnectivityAnnouncer::new(publisher, &kitchen(), config)
            .unwrap()
            .with_retry(RetryBudget::immediate(10))
    }

    #[test]
    fn test_kitchen_motion_without_pin_publishes_nothing() {
        let mut a = announcer(RecordingPublisher::default(), &kitchen_config());
        assert!(a.send_discovery_motion());
        assert_eq!(a.publisher().attempts, 0);
    }

    #[test]
    fn test_kitchen_weather_publishes_three_documents() {
        let mut a = announcer(RecordingPublisher::default(), &kitchen_config());
        assert!(a.send_discovery_weather());

        let topics = a.publisher().topics();
        assert_eq!(
            topics,
            vec![
                "homeassistant/sensor/espresence_Kitchen/temperature/config",
                "homeassistant/sensor/espresence_Kitchen/humidity/config",
                "homeassistant/sensor/espresence_Kitchen/pressure/config",
            ]
        );
        assert!(a.publisher().accepted.iter().all(|m| m.retain));
    }

    #[test]
    fn test_weather_attempts_every_document_even_after_failure() {
        // First document burns its whole budget, the other two still go out
        let mut a = announcer(RecordingPublisher::failing_first(10), &kitchen_config());
        assert!(!a.send_discovery_weather());
        assert_eq!(a.publisher().attempts, 12);
        assert_eq!(a.publisher().accepted.len(), 2);
    }

    #[test]
    fn test_announce_online_publishes_status_and_distance() {
        let mut a = announcer(RecordingPublisher::default(), &kitchen_config());
        assert!(a.announce_online());

        let sent = &a.publisher().accepted;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].topic, "espresense/rooms/Kitchen/status");
        assert_eq!(sent[0].payload, b"online");
        assert!(sent[0].retain);
        assert_eq!(sent[1].topic, "espresense/rooms/Kitchen/max_distance");
        assert_eq!(sent[1].payload, b"16");
        assert!(sent[1].retain);
    }

    #[test]
    fn test_announce_online_is_idempotent() {
        let mut a = announcer(RecordingPublisher::default(), &kitchen_config());
        assert!(a.announce_online());
        assert!(a.announce_online());
        let sent = &a.publisher().accepted;
        assert_eq!(sent[0..2], sent[2..4]);
    }

    #[test]
    fn test_announce_online_fails_without_rollback() {
        let mut a = announcer(RecordingPublisher::always_failing(), &kitchen_config());
        assert!(!a.announce_online());
        // Both topics tried with a full budget each
        assert_eq!(a.publisher().attempts, 20);
    }

    #[test]
    fn test_oversize_room_still_announces_online() {
        let identity = DeviceIdentity::new([0x24, 0x0A, 0xC4, 0x11, 0x22, 0x33], "R".repeat(400), "ESP32");
        let config = kitchen_config();
        let mut a = ConnectivityAnnouncer::new(RecordingPublisher::default(), &identity, &config)
            .unwrap()
            .with_retry(RetryBudget::immediate(10));

        assert!(a.announce_online());
        assert!(!a.send_discovery_connectivity());
        assert!(!a.send_discovery_max_distance());
        assert!(!a.send_discovery_weather());
        // No motion pin configured, so only the online pair reaches the broker
        assert!(a.send_discovery_motion());
        assert_eq!(a.publisher().accepted.len(), 2);
    }

    #[test]
    fn test_discovery_disabled_publishes_nothing() {
        let config = Config {
            discovery: false,
            ..kitchen_config()
        };
        let mut a = announcer(RecordingPublisher::default(), &config);
        for capability in Capability::ALL {
            assert!(a.announce_discovery(capability));
        }
        assert_eq!(a.publisher().attempts, 0);
    }

    #[test]
    fn test_motion_with_pin_is_announced() {
        let config = Config {
            radar_pin: Some(34),
            ..kitchen_config()
        };
        let mut a = announcer(RecordingPublisher::default(), &config);
        assert!(a.send_discovery_motion());
        assert_eq!(
            a.publisher().topics(),
            vec!["homeassistant/binary_sensor/espresense_Kitchen/motion/config"]
        );
    }

    #[test]
    fn test_reconnect_cycle() {
        let mut a = announcer(RecordingPublisher::default(), &kitchen_config());
        a.on_disconnected();
        a.on_disconnected();
        assert!(!a.is_online());
        assert_eq!(a.reconnect_tries(), 2);

        assert!(a.on_connected());
        assert!(a.is_online());
        assert_eq!(a.reconnect_tries(), 0);
        // status + max_distance + connectivity + max_distance discovery + 3 weather
        assert_eq!(a.publisher().accepted.len(), 7);
    }

    #[test]
    fn test_max_distance_command_updates_and_republishes() {
        let mut a = announcer(RecordingPublisher::default(), &kitchen_config());
        assert_eq!(a.handle_message("espresense/rooms/Kitchen/max_distance/set", b" 7 "), Some(7));
        assert_eq!(a.max_distance(), 7);

        let sent = a.publisher().accepted.last().unwrap();
        assert_eq!(sent.topic, "espresense/rooms/Kitchen/max_distance");
        assert_eq!(sent.payload, b"7");
        assert!(sent.retain);
    }

    #[test]
    fn test_invalid_commands_are_ignored() {
        let mut a = announcer(RecordingPublisher::default(), &kitchen_config());
        assert_eq!(a.handle_message("espresense/rooms/Kitchen/max_distance/set", b"far"), None);
        assert_eq!(a.handle_message("espresense/rooms/Other/max_distance/set", b"3"), None);
        assert_eq!(a.max_distance(), 16);
        assert_eq!(a.publisher().attempts, 0);
    }

    #[test]
    fn test_telemetry_is_not_retained_and_counts_failures() {
        let telemetry = Telemetry {
            ip: "10.0.0.2".into(),
            uptime: 5,
            firmware: "esp32".into(),
            version: "local".into(),
            reset_reason: "PowerOn".into(),
            reconnect_tries: 0,
            tele_fails: 0,
            free_heap: 1000,
        };

        let mut a = announcer(RecordingPublisher::failing_first(1), &kitchen_config());
        assert!(!a.publish_telemetry(&telemetry));
        assert!(a.publish_telemetry(&telemetry));

        let sent = &a.publisher().accepted[0];
        assert_eq!(sent.topic, "espresense/rooms/Kitchen/telemetry");
        assert!(!sent.retain);
        let json: serde_json::Value = serde_json::from_slice(&sent.payload).unwrap();
        assert_eq!(json["teleFails"], 1);
    }
}
