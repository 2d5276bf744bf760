use std::time::{Duration, Instant};

/// Monotonic uptime source. Never affected by NTP or the wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemInfo {
    boot_time: Instant,
}

impl SystemInfo {
    pub fn new() -> Self {
        Self {
            boot_time: Instant::now(),
        }
    }

    pub fn get_uptime(&self) -> Duration {
        self.boot_time.elapsed()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.get_uptime().as_secs()
    }

    pub fn format_uptime(&self) -> String {
        format_duration(self.get_uptime())
    }
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_duration(uptime: Duration) -> String {
    let total_secs = uptime.as_secs();

    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "00:59");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 62)), "03:01:02");
    }

    #[test]
    fn test_uptime_is_monotonic() {
        let info = SystemInfo::new();
        let first = info.get_uptime();
        assert!(info.get_uptime() >= first);
    }
}
