// Push update handler - operator-initiated uploads, driven by transport events

use std::io::Read;

use log::{error, info, warn};

use super::firmware::{stream_artifact, FirmwareSink, TransferReport};
use super::session::{SessionTicket, UpdateCoordinator, UpdatePhase};
use super::{ErrorCategory, UpdateError, UpdateOrigin};
use crate::system::display::DisplayEvents;

/// Events raised by the push transport over the life of one upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PushEvent {
    Start { total: Option<usize> },
    Progress { done: usize, total: Option<usize> },
    End,
    Error(ErrorCategory),
}

/// What the handler did with an event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PushTransition {
    /// Session claimed, gate closed
    Started,
    Progressed { fraction: Option<f32> },
    Succeeded,
    Failed(ErrorCategory),
    /// Another session is live; nothing changed
    Rejected(UpdateOrigin),
    /// Event did not belong to a session we own
    Ignored,
}

/// `Idle -> Starting -> Transferring -> {Succeeded, Failed} -> Idle`
///
/// The handler owns a [`SessionTicket`] exactly while a push session is live, so the gate is
/// closed for that window and nothing else.
pub struct PushUpdateHandler<D: DisplayEvents> {
    coordinator: UpdateCoordinator,
    display: D,
    password: Option<String>,
    ticket: Option<SessionTicket>,
}

impl<D: DisplayEvents> PushUpdateHandler<D> {
    pub fn new(coordinator: UpdateCoordinator, display: D, password: Option<String>) -> Self {
        Self {
            coordinator,
            display,
            password: password.filter(|p| !p.is_empty()),
            ticket: None,
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        self.ticket
            .as_ref()
            .map(|t| t.session().phase)
            .unwrap_or(UpdatePhase::Idle)
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn handle(&mut self, event: PushEvent) -> PushTransition {
        match event {
            PushEvent::Start { total } => self.on_start(total),
            PushEvent::Progress { done, total } => self.on_progress(done, total),
            PushEvent::End => self.on_end(),
            PushEvent::Error(category) => self.on_error(category),
        }
    }

    fn on_start(&mut self, total: Option<usize>) -> PushTransition {
        if self.ticket.is_some() {
            warn!("OTA Start while a push session is already live, ignoring");
            return PushTransition::Rejected(UpdateOrigin::Push);
        }

        match self.coordinator.try_begin(UpdateOrigin::Push) {
            Ok(mut ticket) => {
                ticket.set_total(total);
                self.ticket = Some(ticket);
                info!("OTA Start ({} bytes)", total.map(|t| t.to_string()).unwrap_or_else(|| "?".into()));
                self.display.update_begin();
                PushTransition::Started
            }
            Err(UpdateError::Busy(holder)) => PushTransition::Rejected(holder),
            Err(e) => {
                error!("OTA Start failed: {}", e);
                PushTransition::Failed(e.category())
            }
        }
    }

    fn on_progress(&mut self, done: usize, total: Option<usize>) -> PushTransition {
        let Some(ticket) = self.ticket.as_mut() else {
            return PushTransition::Ignored;
        };

        let before = ticket.session().percent();
        ticket.record_progress(done, total);
        let fraction = ticket.session().fraction();

        if let Some(percent) = ticket.session().percent() {
            if before.map_or(true, |b| b / 10 != percent / 10) {
                info!("Progress: {}%", percent);
            }
        }
        if let Some(f) = fraction {
            self.display.update_progress(f);
        }

        PushTransition::Progressed { fraction }
    }

    fn on_end(&mut self) -> PushTransition {
        let Some(ticket) = self.ticket.take() else {
            return PushTransition::Ignored;
        };

        let session = ticket.succeed();
        self.display.update_end();
        info!("OTA End: {} bytes written, restart pending", session.bytes_transferred);
        PushTransition::Succeeded
    }

    fn on_error(&mut self, category: ErrorCategory) -> PushTransition {
        match self.ticket.take() {
            Some(ticket) => {
                let session = ticket.fail();
                error!("OTA Error[{}] after {} bytes", category, session.bytes_transferred);
            }
            None => error!("OTA Error[{}] before a session started", category),
        }
        PushTransition::Failed(category)
    }

    fn authorized(&self, credential: Option<&str>) -> bool {
        match &self.password {
            None => true,
            Some(expected) => credential == Some(expected.as_str()),
        }
    }

    /// Run one complete upload from `body` into `sink`, raising the matching events.
    pub fn receive<R, S>(
        &mut self,
        body: &mut R,
        total: Option<usize>,
        credential: Option<&str>,
        sink: &mut S,
    ) -> Result<TransferReport, UpdateError>
    where
        R: Read + ?Sized,
        S: FirmwareSink + ?Sized,
    {
        if !self.authorized(credential) {
            self.handle(PushEvent::Error(ErrorCategory::Auth));
            return Err(UpdateError::Auth);
        }

        match self.handle(PushEvent::Start { total }) {
            PushTransition::Started => {}
            PushTransition::Rejected(holder) => return Err(UpdateError::Busy(holder)),
            other => return Err(UpdateError::Begin(format!("session not started: {:?}", other))),
        }

        let result = stream_artifact(body, total, sink, |done, total| {
            self.handle(PushEvent::Progress { done, total });
        });

        match result {
            Ok(report) => {
                self.handle(PushEvent::End);
                Ok(report)
            }
            Err(e) => {
                self.handle(PushEvent::Error(e.category()));
                Err(e)
            }
        }
    }
}
