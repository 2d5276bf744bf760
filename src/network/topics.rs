/// Topic layout under the configured namespace root

pub const DEFAULT_ROOMS_ROOT: &str = "espresense/rooms";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementTopics {
    /// `{root}/{room}`, also the `~` of every discovery document
    pub rooms: String,
    pub status: String,
    pub telemetry: String,
    pub max_distance: String,
    pub max_distance_set: String,
    pub motion: String,
    pub weather: String,
}

impl AnnouncementTopics {
    pub fn new(rooms_root: &str, room: &str) -> Self {
        let rooms = format!("{}/{}", rooms_root.trim_end_matches('/'), room);
        Self {
            status: format!("{}/status", rooms),
            telemetry: format!("{}/telemetry", rooms),
            max_distance: format!("{}/max_distance", rooms),
            max_distance_set: format!("{}/max_distance/set", rooms),
            motion: format!("{}/motion", rooms),
            weather: format!("{}/weather", rooms),
            rooms,
        }
    }

    /// Topics the device listens on
    pub fn subscriptions(&self) -> [&str; 1] {
        [self.max_distance_set.as_str()]
    }

    pub fn all(&self) -> [&str; 7] {
        [
            &self.rooms,
            &self.status,
            &self.telemetry,
            &self.max_distance,
            &self.max_distance_set,
            &self.motion,
            &self.weather,
        ]
    }
}
