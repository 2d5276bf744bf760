// Update session bookkeeping - one live session at a time, gate closed exactly while it lives

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::gate::UpdateGate;
use super::{UpdateError, UpdateOrigin};

const SLOT_FREE: u8 = 0;
const SLOT_PUSH: u8 = 1;
const SLOT_PULL: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    Starting,
    Transferring,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSession {
    pub origin: UpdateOrigin,
    pub phase: UpdatePhase,
    pub bytes_transferred: usize,
    pub bytes_total: Option<usize>,
}

impl UpdateSession {
    fn new(origin: UpdateOrigin) -> Self {
        Self {
            origin,
            phase: UpdatePhase::Starting,
            bytes_transferred: 0,
            bytes_total: None,
        }
    }

    /// Transfer progress in `0.0..=1.0`, when the size is known
    pub fn fraction(&self) -> Option<f32> {
        match self.bytes_total {
            Some(total) if total > 0 => Some((self.bytes_transferred as f32 / total as f32).min(1.0)),
            _ => None,
        }
    }

    /// Whole percent for logs
    pub fn percent(&self) -> Option<u8> {
        self.fraction().map(|f| (f * 100.0) as u8)
    }
}

/// Hands out the single update session. Both update flows hold a clone.
#[derive(Clone, Debug)]
pub struct UpdateCoordinator {
    gate: UpdateGate,
    active: Arc<AtomicU8>,
}

impl UpdateCoordinator {
    pub fn new(gate: UpdateGate) -> Self {
        Self {
            gate,
            active: Arc::new(AtomicU8::new(SLOT_FREE)),
        }
    }

    pub fn gate(&self) -> &UpdateGate {
        &self.gate
    }

    /// Origin of the live session, if any
    pub fn active_origin(&self) -> Option<UpdateOrigin> {
        decode(self.active.load(Ordering::Acquire))
    }

    /// Claim the session slot and close the gate. A live session of either origin rejects the claim.
    pub fn try_begin(&self, origin: UpdateOrigin) -> Result<SessionTicket, UpdateError> {
        let slot = match origin {
            UpdateOrigin::Push => SLOT_PUSH,
            UpdateOrigin::Pull => SLOT_PULL,
        };

        if let Err(current) = self
            .active
            .compare_exchange(SLOT_FREE, slot, Ordering::AcqRel, Ordering::Acquire)
        {
            let holder = decode(current).unwrap_or(origin);
            log::warn!("Rejecting {} update: {} update session already live", origin, holder);
            return Err(UpdateError::Busy(holder));
        }

        self.gate.set_unsafe(true);
        log::info!("{} update session started", origin);

        Ok(SessionTicket {
            session: UpdateSession::new(origin),
            gate: self.gate.clone(),
            active: Arc::clone(&self.active),
            released: false,
        })
    }
}

fn decode(slot: u8) -> Option<UpdateOrigin> {
    match slot {
        SLOT_PUSH => Some(UpdateOrigin::Push),
        SLOT_PULL => Some(UpdateOrigin::Pull),
        _ => None,
    }
}

/// Proof of owning the live session. Dropping it, on any path, opens the gate and frees the slot.
#[derive(Debug)]
pub struct SessionTicket {
    session: UpdateSession,
    gate: UpdateGate,
    active: Arc<AtomicU8>,
    released: bool,
}

impl SessionTicket {
    pub fn session(&self) -> &UpdateSession {
        &self.session
    }

    pub fn set_total(&mut self, total: Option<usize>) {
        if total.is_some() {
            self.session.bytes_total = total;
        }
    }

    pub fn record_progress(&mut self, done: usize, total: Option<usize>) {
        self.set_total(total);
        self.session.bytes_transferred = done;
        self.session.phase = UpdatePhase::Transferring;
    }

    pub fn succeed(mut self) -> UpdateSession {
        self.session.phase = UpdatePhase::Succeeded;
        self.release();
        self.session.clone()
    }

    pub fn fail(mut self) -> UpdateSession {
        self.session.phase = UpdatePhase::Failed;
        self.release();
        self.session.clone()
    }

    /// End the session without an image change (e.g. server reported nothing new)
    pub fn abandon(mut self) -> UpdateSession {
        self.session.phase = UpdatePhase::Idle;
        self.release();
        self.session.clone()
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.gate.set_unsafe(false);
        self.active.store(SLOT_FREE, Ordering::Release);
        log::debug!("{} update session released ({:?})", self.session.origin, self.session.phase);
    }
}

impl Drop for SessionTicket {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("{} update session dropped mid-flight, releasing gate", self.session.origin);
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator() -> UpdateCoordinator {
        UpdateCoordinator::new(UpdateGate::new())
    }

    #[test]
    fn test_claiming_closes_gate_and_finishing_opens_it() {
        let coord = coordinator();
        assert!(!coord.gate().is_unsafe());

        let ticket = coord.try_begin(UpdateOrigin::Push).unwrap();
        assert!(coord.gate().is_unsafe());
        assert_eq!(ticket.session().phase, UpdatePhase::Starting);
        assert_eq!(coord.active_origin(), Some(UpdateOrigin::Push));

        let session = ticket.succeed();
        assert_eq!(session.phase, UpdatePhase::Succeeded);
        assert!(!coord.gate().is_unsafe());
        assert_eq!(coord.active_origin(), None);
    }

    #[test]
    fn test_second_claim_of_either_origin_is_rejected() {
        let coord = coordinator();
        let _held = coord.try_begin(UpdateOrigin::Pull).unwrap();

        assert_eq!(coord.try_begin(UpdateOrigin::Push).unwrap_err(), UpdateError::Busy(UpdateOrigin::Pull));
        assert_eq!(coord.try_begin(UpdateOrigin::Pull).unwrap_err(), UpdateError::Busy(UpdateOrigin::Pull));
        assert!(coord.gate().is_unsafe());
    }

    #[test]
    fn test_failed_session_still_opens_gate() {
        let coord = coordinator();
        let mut ticket = coord.try_begin(UpdateOrigin::Pull).unwrap();
        ticket.record_progress(512, Some(1024));
        assert_eq!(ticket.session().percent(), Some(50));

        let session = ticket.fail();
        assert_eq!(session.phase, UpdatePhase::Failed);
        assert_eq!(session.bytes_transferred, 512);
        assert!(!coord.gate().is_unsafe());
        assert!(coord.try_begin(UpdateOrigin::Push).is_ok());
    }

    #[test]
    fn test_dropped_ticket_releases_even_on_panic() {
        let coord = coordinator();
        let inner = coord.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _ticket = inner.try_begin(UpdateOrigin::Push).unwrap();
            panic!("transfer task died");
        }));
        assert!(result.is_err());
        assert!(!coord.gate().is_unsafe());
        assert_eq!(coord.active_origin(), None);
    }

    #[test]
    fn test_fraction_is_none_without_total() {
        let coord = coordinator();
        let mut ticket = coord.try_begin(UpdateOrigin::Pull).unwrap();
        ticket.record_progress(100, None);
        assert_eq!(ticket.session().fraction(), None);
        ticket.set_total(Some(400));
        assert_eq!(ticket.session().fraction(), Some(0.25));
    }
}
