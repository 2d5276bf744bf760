pub mod display;
pub mod failsafe;
pub mod identity;
pub mod info;

pub use display::{DisplayEvents, LogDisplay};
pub use failsafe::{prepare_storage, ButtonInput, FailsafeConfig, StorageError, StorageOutcome, StorageVolume};
pub use identity::DeviceIdentity;
pub use info::SystemInfo;
