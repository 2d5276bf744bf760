// Update gate - the single flag that tells the sensing subsystem to stand down while flash is written

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Observer = Arc<dyn Fn(bool) + Send + Sync>;

/// Shared handle to the "unsafe to sense" flag.
///
/// Clones share the same flag. Only the update flows (through a session ticket) write it;
/// everything else gets a [`SensingSuppression`] view. Reads never take a lock.
#[derive(Clone, Default)]
pub struct UpdateGate {
    flag: Arc<AtomicBool>,
    observers: Arc<Mutex<Vec<Observer>>>,
}

impl UpdateGate {
    /// A fresh gate starts safe, which is also what every reboot resets it to
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unsafe(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Set the flag and notify observers on an actual transition
    pub fn set_unsafe(&self, value: bool) {
        let previous = self.flag.swap(value, Ordering::AcqRel);
        if previous == value {
            return;
        }

        log::info!("Update gate {}", if value { "closed: sensing suppressed" } else { "opened: sensing allowed" });

        // Snapshot so observers may subscribe or touch the gate without holding the lock
        let observers: Vec<Observer> = match self.observers.lock() {
            Ok(observers) => observers.clone(),
            Err(e) => {
                log::warn!("Update gate observers unavailable: {}", e);
                return;
            }
        };
        for observer in observers {
            observer(value);
        }
    }

    /// Register a callback fired with the new value on every transition
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        match self.observers.lock() {
            Ok(mut observers) => observers.push(Arc::new(observer)),
            Err(e) => log::warn!("Failed to register update gate observer: {}", e),
        }
    }

    /// Read-only view handed to the sensing subsystem
    pub fn suppression(&self) -> SensingSuppression {
        SensingSuppression { flag: Arc::clone(&self.flag) }
    }
}

impl core::fmt::Debug for UpdateGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UpdateGate").field("unsafe", &self.is_unsafe()).finish()
    }
}

/// What the sensing subsystem polls before each scan
#[derive(Debug, Clone)]
pub struct SensingSuppression {
    flag: Arc<AtomicBool>,
}

impl SensingSuppression {
    pub fn is_sensing_suppressed(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
