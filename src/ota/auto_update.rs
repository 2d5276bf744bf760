// Auto update - periodic, version-gated pull of the latest release artifact

use std::io::Read;

use log::{debug, error, info, warn};

use super::firmware::{stream_artifact, FirmwareSink, TransferReport};
use super::session::UpdateCoordinator;
use super::{UpdateError, UpdateOrigin};

pub const CHECK_FOR_UPDATES_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com/ESPresense/ESPresense/releases";

/// Answer to the metadata probe (no redirect following, no body)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub location: Option<String>,
}

/// Result of requesting the artifact itself (redirects followed)
pub enum Download<'a> {
    /// Server says the running image is current
    NotModified,
    Artifact {
        total: Option<usize>,
        body: Box<dyn Read + 'a>,
    },
}

/// Transport to the release endpoint. On the device this is TLS without certificate checks:
/// the release host is trusted by URL, not by pinning.
pub trait ReleaseClient {
    fn probe(&mut self, url: &str) -> Result<ProbeResponse, UpdateError>;
    fn download(&mut self, url: &str) -> Result<Download<'_>, UpdateError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoUpdateSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    pub release_base_url: String,
    pub firmware: String,
    /// Version token of the running build; `None` when the build was not stamped
    pub version: Option<String>,
}

impl AutoUpdateSettings {
    /// `{base}/latest/download/{firmware}.bin`
    pub fn artifact_url(&self) -> String {
        format!(
            "{}/latest/download/{}.bin",
            self.release_base_url.trim_end_matches('/'),
            self.firmware
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Disabled,
    NotDue,
    /// A push session held the slot; no transfer attempted
    Busy(UpdateOrigin),
    NoUpdateAvailable,
    Failed(UpdateError),
    Succeeded(TransferReport),
}

/// Decide from the probe whether a newer build exists.
pub fn newer_release_available(probe: &ProbeResponse, version: &str) -> bool {
    if !(300..400).contains(&probe.status) {
        return false;
    }
    match probe.location.as_deref() {
        Some(location) => !location.contains(version),
        None => false,
    }
}

pub struct AutoUpdateChecker<C: ReleaseClient, S: FirmwareSink> {
    settings: AutoUpdateSettings,
    client: C,
    sink: S,
    coordinator: UpdateCoordinator,
    last_checked_secs: u64,
}

impl<C: ReleaseClient, S: FirmwareSink> AutoUpdateChecker<C, S> {
    pub fn new(settings: AutoUpdateSettings, client: C, sink: S, coordinator: UpdateCoordinator) -> Self {
        Self {
            settings,
            client,
            sink,
            coordinator,
            last_checked_secs: 0,
        }
    }

    pub fn settings(&self) -> &AutoUpdateSettings {
        &self.settings
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one check if enabled and the interval has elapsed since the last one.
    ///
    /// `uptime_secs` is monotonic time since boot, never wall-clock time.
    pub fn poll(&mut self, uptime_secs: u64) -> CheckOutcome {
        if !self.settings.enabled {
            return CheckOutcome::Disabled;
        }
        if uptime_secs.saturating_sub(self.last_checked_secs) < self.settings.interval_secs {
            return CheckOutcome::NotDue;
        }
        self.last_checked_secs = uptime_secs;

        let url = self.settings.artifact_url();

        // A blank token matches every Location, so it counts as no token at all
        match self.settings.version.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(version) => {
                let probe = match self.client.probe(&url) {
                    Ok(probe) => probe,
                    Err(e) => {
                        warn!("Update probe failed: {}", e);
                        return CheckOutcome::Failed(e);
                    }
                };
                let location = probe.location.as_deref().unwrap_or("");
                if !newer_release_available(&probe, version) {
                    info!("Not updating from (sc={}): {}", probe.status, location);
                    return CheckOutcome::NoUpdateAvailable;
                }
                info!("Updating from (sc={}): {}", probe.status, location);
            }
            None => debug!("Build has no version token, skipping probe and pulling {}", url),
        }

        self.pull(&url)
    }

    fn pull(&mut self, url: &str) -> CheckOutcome {
        let mut ticket = match self.coordinator.try_begin(UpdateOrigin::Pull) {
            Ok(ticket) => ticket,
            Err(UpdateError::Busy(holder)) => return CheckOutcome::Busy(holder),
            Err(e) => return CheckOutcome::Failed(e),
        };

        let (total, mut body) = match self.client.download(url) {
            Ok(Download::Artifact { total, body }) => (total, body),
            Ok(Download::NotModified) => {
                ticket.abandon();
                info!("No Update!");
                return CheckOutcome::NoUpdateAvailable;
            }
            Err(e) => {
                ticket.fail();
                error!("Http Update Failed: {}", e);
                return CheckOutcome::Failed(e);
            }
        };

        let mut last_decile = None;
        let result = stream_artifact(&mut *body, total, &mut self.sink, |done, total| {
            ticket.record_progress(done, total);
            if let Some(percent) = ticket.session().percent() {
                if last_decile != Some(percent / 10) {
                    last_decile = Some(percent / 10);
                    debug!("Pull update progress: {}%", percent);
                }
            }
        });
        drop(body);

        match result {
            Ok(report) => {
                ticket.succeed();
                warn!("Update OK!");
                CheckOutcome::Succeeded(report)
            }
            Err(e) => {
                ticket.fail();
                error!("Http Update Failed ({}): {}", e.category(), e);
                CheckOutcome::Failed(e)
            }
        }
    }
}
