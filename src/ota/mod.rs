// OTA (Over-The-Air) update module

pub mod auto_update;
pub mod firmware;
pub mod gate;
pub mod push;
pub mod session;

pub use auto_update::{AutoUpdateChecker, AutoUpdateSettings, CheckOutcome, Download, ProbeResponse, ReleaseClient};
pub use firmware::{stream_artifact, FirmwareSink, TransferReport};
pub use gate::{SensingSuppression, UpdateGate};
pub use push::{PushEvent, PushTransition, PushUpdateHandler};
pub use session::{SessionTicket, UpdateCoordinator, UpdatePhase, UpdateSession};

// Update flow, push or pull:
// 1. Claim the single update session (closes the gate)
// 2. Stream the image into the inactive OTA partition
// 3. Finalize and mark it bootable
// 4. Release the session (opens the gate), platform restarts on success

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// Operator uploaded an image to the device
    Push,
    /// Device fetched a newer release on its own
    Pull,
}

impl core::fmt::Display for UpdateOrigin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UpdateOrigin::Push => f.write_str("push"),
            UpdateOrigin::Pull => f.write_str("pull"),
        }
    }
}

/// Diagnostic category of a failed update, mirrors the phases of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    Begin,
    Connect,
    Receive,
    End,
}

impl core::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            ErrorCategory::Auth => "Auth Failed",
            ErrorCategory::Begin => "Begin Failed",
            ErrorCategory::Connect => "Connect Failed",
            ErrorCategory::Receive => "Receive Failed",
            ErrorCategory::End => "End Failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// Another update session is already live
    Busy(UpdateOrigin),
    /// Push credentials missing or wrong
    Auth,
    /// Partition could not be prepared, or the announced size is unusable
    Begin(String),
    /// Remote endpoint unreachable or answered with an unusable status
    Connect(String),
    /// Stream broke off, or the image could not be written
    Receive(String),
    /// Image rejected on finalize
    End(String),
}

impl UpdateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            UpdateError::Busy(_) | UpdateError::Begin(_) => ErrorCategory::Begin,
            UpdateError::Auth => ErrorCategory::Auth,
            UpdateError::Connect(_) => ErrorCategory::Connect,
            UpdateError::Receive(_) => ErrorCategory::Receive,
            UpdateError::End(_) => ErrorCategory::End,
        }
    }
}

impl core::fmt::Display for UpdateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UpdateError::Busy(origin) => write!(f, "{} update already in progress", origin),
            UpdateError::Auth => f.write_str("authentication failed"),
            UpdateError::Begin(detail) => write!(f, "begin failed: {}", detail),
            UpdateError::Connect(detail) => write!(f, "connect failed: {}", detail),
            UpdateError::Receive(detail) => write!(f, "receive failed: {}", detail),
            UpdateError::End(detail) => write!(f, "end failed: {}", detail),
        }
    }
}

impl std::error::Error for UpdateError {}
