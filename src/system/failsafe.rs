// Failsafe storage reset - hold the boot button through the debounce window to wipe settings

use std::time::{Duration, Instant};

use super::display::DisplayEvents;

const FAILSAFE_DEBOUNCE: Duration = Duration::from_millis(250);
const FAILSAFE_THRESHOLD: u32 = 10;
const FAILSAFE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Dedicated boot input. Implementations handle pull-ups and polarity.
pub trait ButtonInput {
    fn is_pressed(&mut self) -> bool;
}

/// Persistent storage the failsafe can wipe
pub trait StorageVolume {
    /// Destroy everything stored
    fn format(&mut self) -> Result<(), StorageError>;
    fn mount(&mut self) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    Format(String),
    Mount(String),
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StorageError::Format(detail) => write!(f, "storage format failed: {}", detail),
            StorageError::Mount(detail) => write!(f, "storage mount failed: {}", detail),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailsafeConfig {
    pub debounce: Duration,
    pub threshold: u32,
    pub poll_interval: Duration,
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            debounce: FAILSAFE_DEBOUNCE,
            threshold: FAILSAFE_THRESHOLD,
            poll_interval: FAILSAFE_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailsafeStep {
    /// Still held; `counted` is true when this tick completed a debounced sample
    Sampling { presses: u32, counted: bool },
    /// Let go before the threshold
    Released { presses: u32 },
    /// Held long enough, storage must be wiped
    Triggered,
}

/// Debounce counter driven by a scheduler tick. Time is milliseconds since the machine was created.
#[derive(Debug)]
pub struct FailsafeReset {
    debounce_ms: u64,
    threshold: u32,
    presses: u32,
    last_sample_ms: u64,
}

impl FailsafeReset {
    pub fn new(config: &FailsafeConfig) -> Self {
        Self {
            debounce_ms: config.debounce.as_millis() as u64,
            threshold: config.threshold,
            presses: 0,
            last_sample_ms: 0,
        }
    }

    pub fn presses(&self) -> u32 {
        self.presses
    }

    pub fn tick(&mut self, now_ms: u64, pressed: bool) -> FailsafeStep {
        if self.presses >= self.threshold {
            return FailsafeStep::Triggered;
        }
        if !pressed {
            return FailsafeStep::Released { presses: self.presses };
        }
        if now_ms.saturating_sub(self.last_sample_ms) < self.debounce_ms {
            return FailsafeStep::Sampling { presses: self.presses, counted: false };
        }

        self.last_sample_ms = now_ms;
        self.presses += 1;

        if self.presses >= self.threshold {
            FailsafeStep::Triggered
        } else {
            FailsafeStep::Sampling { presses: self.presses, counted: true }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOutcome {
    Mounted,
    Reformatted,
}

/// Boot-time gate in front of the storage mount.
///
/// Without a button, or when it is not held long enough, storage is mounted untouched.
/// Once the threshold is reached the wipe happens with no confirmation.
pub fn prepare_storage<B, S, D>(
    button: Option<&mut B>,
    storage: &mut S,
    display: &mut D,
    config: &FailsafeConfig,
) -> Result<StorageOutcome, StorageError>
where
    B: ButtonInput + ?Sized,
    S: StorageVolume + ?Sized,
    D: DisplayEvents + ?Sized,
{
    if let Some(button) = button {
        let started = Instant::now();
        let mut machine = FailsafeReset::new(config);

        loop {
            let now_ms = started.elapsed().as_millis() as u64;
            match machine.tick(now_ms, button.is_pressed()) {
                FailsafeStep::Sampling { counted, presses } => {
                    if counted {
                        log::debug!("Failsafe button held ({}/{})", presses, config.threshold);
                        display.connecting();
                    }
                }
                FailsafeStep::Released { presses } => {
                    if presses > 0 {
                        log::info!("Failsafe button released after {} samples, keeping storage", presses);
                    }
                    break;
                }
                FailsafeStep::Triggered => {
                    log::warn!("Failsafe reset: formatting persistent storage");
                    display.erasing();
                    storage.format()?;
                    storage.mount()?;
                    display.erased();
                    return Ok(StorageOutcome::Reformatted);
                }
            }
            std::thread::sleep(config.poll_interval);
        }
    }

    storage.mount()?;
    Ok(StorageOutcome::Mounted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::{DisplayLog, FakeButton, FakeStorage, RecordingDisplay};

    fn quick() -> FailsafeConfig {
        FailsafeConfig {
            debounce: Duration::ZERO,
            threshold: FAILSAFE_THRESHOLD,
            poll_interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_samples_only_count_after_debounce_window() {
        let mut m = FailsafeReset::new(&FailsafeConfig::default());
        assert_eq!(m.tick(0, true), FailsafeStep::Sampling { presses: 0, counted: false });
        assert_eq!(m.tick(249, true), FailsafeStep::Sampling { presses: 0, counted: false });
        assert_eq!(m.tick(250, true), FailsafeStep::Sampling { presses: 1, counted: true });
        assert_eq!(m.tick(300, true), FailsafeStep::Sampling { presses: 1, counted: false });
        assert_eq!(m.tick(500, true), FailsafeStep::Sampling { presses: 2, counted: true });
    }

    #[test]
    fn test_nine_presses_then_release_keeps_storage() {
        let mut m = FailsafeReset::new(&FailsafeConfig::default());
        for i in 1..=9u64 {
            assert!(matches!(m.tick(i * 250, true), FailsafeStep::Sampling { counted: true, .. }));
        }
        assert_eq!(m.tick(2400, false), FailsafeStep::Released { presses: 9 });
    }

    #[test]
    fn test_tenth_press_triggers() {
        let mut m = FailsafeReset::new(&FailsafeConfig::default());
        for i in 1..=9u64 {
            m.tick(i * 250, true);
        }
        assert_eq!(m.tick(2500, true), FailsafeStep::Triggered);
        // Stays triggered even if released afterwards
        assert_eq!(m.tick(2600, false), FailsafeStep::Triggered);
    }

    #[test]
    fn test_no_button_mounts_normally() {
        let mut storage = FakeStorage::default();
        let mut display = RecordingDisplay::default();
        let outcome =
            prepare_storage::<FakeButton, _, _>(None, &mut storage, &mut display, &FailsafeConfig::default()).unwrap();
        assert_eq!(outcome, StorageOutcome::Mounted);
        assert_eq!(storage.formats, 0);
        assert_eq!(storage.mounts, 1);
        assert!(display.events.is_empty());
    }

    #[test]
    fn test_short_hold_falls_through_to_mount() {
        let mut button = FakeButton::held_for(9);
        let mut storage = FakeStorage::default();
        let mut display = RecordingDisplay::default();

        let outcome = prepare_storage(Some(&mut button), &mut storage, &mut display, &quick()).unwrap();

        assert_eq!(outcome, StorageOutcome::Mounted);
        assert_eq!(storage.formats, 0);
        assert_eq!(storage.mounts, 1);
        assert_eq!(display.events, vec![DisplayLog::Connecting; 9]);
    }

    #[test]
    fn test_long_hold_reformats_storage() {
        let mut button = FakeButton::held_for(50);
        let mut storage = FakeStorage::default();
        let mut display = RecordingDisplay::default();

        let outcome = prepare_storage(Some(&mut button), &mut storage, &mut display, &quick()).unwrap();

        assert_eq!(outcome, StorageOutcome::Reformatted);
        assert_eq!(storage.formats, 1);
        assert_eq!(storage.mounts, 1);
        assert_eq!(button.reads, 10);
        assert_eq!(&display.events[9..], &[DisplayLog::Erasing, DisplayLog::Erased]);
    }

    #[test]
    fn test_format_failure_is_reported() {
        let mut button = FakeButton::held_for(50);
        let mut storage = FakeStorage {
            fail_format: true,
            ..Default::default()
        };
        let mut display = RecordingDisplay::default();

        let err = prepare_storage(Some(&mut button), &mut storage, &mut display, &quick()).unwrap_err();
        assert!(matches!(err, StorageError::Format(_)));
        assert!(!display.events.contains(&DisplayLog::Erased));
    }
}
