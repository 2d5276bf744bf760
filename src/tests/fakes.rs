// In-memory stand-ins for every hardware and network seam

use std::io::{self, Cursor, Read};

use crate::network::{PublishError, Publisher, QoS};
use crate::ota::auto_update::{Download, ProbeResponse, ReleaseClient};
use crate::ota::{FirmwareSink, UpdateError};
use crate::system::{ButtonInput, DisplayEvents, StorageError, StorageVolume};

/// Firmware partition backed by a Vec
#[derive(Debug, Default)]
pub struct MemorySink {
    pub data: Vec<u8>,
    pub begun: bool,
    pub completed: bool,
    pub aborted: bool,
    pub reject_complete: bool,
    pub reject_writes: bool,
}

impl FirmwareSink for MemorySink {
    fn begin(&mut self, _total: Option<usize>) -> Result<(), UpdateError> {
        self.begun = true;
        self.completed = false;
        self.aborted = false;
        self.data.clear();
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), UpdateError> {
        if self.reject_writes {
            return Err(UpdateError::Receive("flash write failed".into()));
        }
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    fn complete(&mut self) -> Result<(), UpdateError> {
        if self.reject_complete {
            return Err(UpdateError::End("image validation failed".into()));
        }
        self.completed = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

/// Yields its data, then fails like a dropped connection
pub struct FailingReader {
    inner: Cursor<Vec<u8>>,
}

impl FailingReader {
    pub fn after(data: Vec<u8>) -> Self {
        Self {
            inner: Cursor::new(data),
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            n => Ok(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayLog {
    Connecting,
    Erasing,
    Erased,
    UpdateBegin,
    UpdateProgress(f32),
    UpdateEnd,
}

#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub events: Vec<DisplayLog>,
}

impl DisplayEvents for RecordingDisplay {
    fn connecting(&mut self) {
        self.events.push(DisplayLog::Connecting);
    }

    fn erasing(&mut self) {
        self.events.push(DisplayLog::Erasing);
    }

    fn erased(&mut self) {
        self.events.push(DisplayLog::Erased);
    }

    fn update_begin(&mut self) {
        self.events.push(DisplayLog::UpdateBegin);
    }

    fn update_progress(&mut self, fraction: f32) {
        self.events.push(DisplayLog::UpdateProgress(fraction));
    }

    fn update_end(&mut self) {
        self.events.push(DisplayLog::UpdateEnd);
    }
}

pub const FAKE_IMAGE_LEN: usize = 2048;

/// Release server that redirects `latest` to a fixed version
#[derive(Debug)]
pub struct FakeReleaseClient {
    pub latest: String,
    pub probes: usize,
    pub downloads: usize,
    pub probe_status: u16,
    pub not_modified: bool,
    pub truncate_body: bool,
    pub probe_error: Option<UpdateError>,
    pub download_error: Option<UpdateError>,
}

impl FakeReleaseClient {
    pub fn redirect_to(version: &str) -> Self {
        Self {
            latest: version.to_string(),
            probes: 0,
            downloads: 0,
            probe_status: 302,
            not_modified: false,
            truncate_body: false,
            probe_error: None,
            download_error: None,
        }
    }
}

impl ReleaseClient for FakeReleaseClient {
    fn probe(&mut self, _url: &str) -> Result<ProbeResponse, UpdateError> {
        self.probes += 1;
        if let Some(e) = self.probe_error.clone() {
            return Err(e);
        }
        Ok(ProbeResponse {
            status: self.probe_status,
            location: Some(format!(
                "https://github.com/ESPresense/ESPresense/releases/download/{}/esp32.bin",
                self.latest
            )),
        })
    }

    fn download(&mut self, _url: &str) -> Result<Download<'_>, UpdateError> {
        self.downloads += 1;
        if let Some(e) = self.download_error.clone() {
            return Err(e);
        }
        if self.not_modified {
            return Ok(Download::NotModified);
        }
        let len = if self.truncate_body { FAKE_IMAGE_LEN / 2 } else { FAKE_IMAGE_LEN };
        Ok(Download::Artifact {
            total: Some(FAKE_IMAGE_LEN),
            body: Box::new(Cursor::new(vec![0xE9u8; len])),
        })
    }
}

/// Boot button held for a number of reads, then released
#[derive(Debug)]
pub struct FakeButton {
    held: u32,
    pub reads: u32,
}

impl FakeButton {
    pub fn held_for(reads: u32) -> Self {
        Self { held: reads, reads: 0 }
    }
}

impl ButtonInput for FakeButton {
    fn is_pressed(&mut self) -> bool {
        self.reads += 1;
        self.reads <= self.held
    }
}

#[derive(Debug, Default)]
pub struct FakeStorage {
    pub formats: u32,
    pub mounts: u32,
    pub fail_format: bool,
}

impl StorageVolume for FakeStorage {
    fn format(&mut self) -> Result<(), StorageError> {
        if self.fail_format {
            return Err(StorageError::Format("flash erase failed".into()));
        }
        self.formats += 1;
        Ok(())
    }

    fn mount(&mut self) -> Result<(), StorageError> {
        self.mounts += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub qos: u8,
    pub retain: bool,
    pub payload: Vec<u8>,
}

/// Broker that rejects the first `fail_first` attempts, then records everything
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    fail_first: u32,
    pub attempts: u32,
    pub accepted: Vec<PublishedMessage>,
}

impl RecordingPublisher {
    pub fn failing_first(fail_first: u32) -> Self {
        Self {
            fail_first,
            ..Default::default()
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    pub fn topics(&self) -> Vec<&str> {
        self.accepted.iter().map(|m| m.topic.as_str()).collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, topic: &str, qos: QoS, retain: bool, payload: &[u8]) -> Result<(), PublishError> {
        self.attempts += 1;
        if self.attempts <= self.fail_first {
            return Err(PublishError::NotConnected);
        }
        self.accepted.push(PublishedMessage {
            topic: topic.to_string(),
            qos: qos as u8,
            retain,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}
