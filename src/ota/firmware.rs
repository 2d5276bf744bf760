// Firmware image streaming - shared by push uploads and pull downloads

use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read};

use super::UpdateError;

/// Firmware should be between 0 and 4MB (size of one app partition on the 8MB layouts)
pub const MAX_FIRMWARE_SIZE: usize = 4 * 1024 * 1024;
const CHUNK_SIZE: usize = 4096;

/// Destination of an image: the inactive OTA partition on the device, a buffer in tests.
pub trait FirmwareSink {
    /// Prepare for an image of `total` bytes (unknown when the server sent no length)
    fn begin(&mut self, total: Option<usize>) -> Result<(), UpdateError>;
    fn write(&mut self, chunk: &[u8]) -> Result<(), UpdateError>;
    /// Validate the image and mark it bootable
    fn complete(&mut self) -> Result<(), UpdateError>;
    /// Throw away a partially written image
    fn abort(&mut self);
}

impl<S: FirmwareSink + ?Sized> FirmwareSink for &mut S {
    fn begin(&mut self, total: Option<usize>) -> Result<(), UpdateError> {
        (**self).begin(total)
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), UpdateError> {
        (**self).write(chunk)
    }

    fn complete(&mut self) -> Result<(), UpdateError> {
        (**self).complete()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub bytes: usize,
    pub sha256: [u8; 32],
}

impl TransferReport {
    pub fn digest_hex(&self) -> String {
        self.sha256.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Copy `body` into `sink`, reporting `(bytes_so_far, total)` after every chunk.
///
/// The sink is aborted on every error path; on success it has been completed.
pub fn stream_artifact<R, S, F>(
    body: &mut R,
    total: Option<usize>,
    sink: &mut S,
    mut on_progress: F,
) -> Result<TransferReport, UpdateError>
where
    R: Read + ?Sized,
    S: FirmwareSink + ?Sized,
    F: FnMut(usize, Option<usize>),
{
    if let Some(size) = total {
        if size == 0 || size > MAX_FIRMWARE_SIZE {
            return Err(UpdateError::Begin(format!("invalid image size {} bytes", size)));
        }
    }

    sink.begin(total)?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written = 0usize;

    loop {
        let read = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                sink.abort();
                return Err(UpdateError::Receive(format!("stream error after {} bytes: {}", written, e)));
            }
        };

        if written + read > total.unwrap_or(MAX_FIRMWARE_SIZE) {
            sink.abort();
            return Err(UpdateError::Receive(format!(
                "image exceeds {} bytes",
                total.unwrap_or(MAX_FIRMWARE_SIZE)
            )));
        }

        if let Err(e) = sink.write(&buffer[..read]) {
            log::error!("Firmware write failed after {} bytes: {}", written, e);
            sink.abort();
            return Err(e);
        }

        hasher.update(&buffer[..read]);
        written += read;
        on_progress(written, total);
    }

    if written == 0 {
        sink.abort();
        return Err(UpdateError::Receive("empty image".to_string()));
    }

    if let Some(expected) = total {
        if written != expected {
            sink.abort();
            return Err(UpdateError::Receive(format!("short read: {} of {} bytes", written, expected)));
        }
    }

    if let Err(e) = sink.complete() {
        sink.abort();
        return Err(e);
    }

    let report = TransferReport {
        bytes: written,
        sha256: hasher.finalize().into(),
    };
    log::info!("Firmware image received: {} bytes, sha256 {}", report.bytes, report.digest_hex());
    Ok(report)
}
