use std::thread;
use std::time::Duration;

use super::publisher::{PublishError, Publisher, QoS};

const PUBLISH_MAX_ATTEMPTS: u32 = 10;
const PUBLISH_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Bounded at-least-once policy shared by every announcement publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            max_attempts: PUBLISH_MAX_ATTEMPTS,
            delay: PUBLISH_RETRY_DELAY,
        }
    }
}

impl RetryBudget {
    /// Same ceiling, no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    /// Publish until accepted or the budget is spent. Returns the attempt that succeeded.
    pub fn publish<P: Publisher + ?Sized>(
        &self,
        publisher: &mut P,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> Result<u32, PublishError> {
        let mut last_error = PublishError::NotConnected;

        for attempt in 1..=self.max_attempts {
            match publisher.publish(topic, qos, retain, payload) {
                Ok(()) => {
                    if attempt > 1 {
                        log::debug!("Published {} on attempt {}", topic, attempt);
                    }
                    return Ok(attempt);
                }
                Err(e) => {
                    log::debug!("Publish to {} failed (attempt {}/{}): {}", topic, attempt, self.max_attempts, e);
                    last_error = e;
                    if attempt < self.max_attempts && !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                }
            }
        }

        log::warn!("Giving up on {} after {} attempts: {}", topic, self.max_attempts, last_error);
        Err(last_error)
    }
}
