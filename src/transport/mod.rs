//! Transport dispatch: one `send` entry point over two delivery paths.
//!
//! ## Design
//! - Two states, {Duplex, Fallback}, derived from whether the duplex channel
//!   is currently open. Open/close events are the only transition triggers.
//! - Duplex delivery is fire-and-forget: the reply arrives later through the
//!   inbound event stream registered once at startup.
//! - Fallback delivery is one request/response call whose reply is handled
//!   inside the same dispatch cycle.
//! - Failures never escape: a failed fallback yields a [`RetryTicket`] that
//!   replays the identical command, only on explicit request.

pub mod duplex;
pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::error::DracoError;
use crate::protocol::{DracoReply, UserCommand};
use crate::render::TransportStatus;

/// Which delivery path `send` will take next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Duplex,
    Fallback,
}

/// Asynchronous arrivals from the duplex path.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Reply(DracoReply),
    Status(TransportStatus),
}

/// Outbound half of the duplex channel.
pub trait DuplexLink: Send {
    fn is_open(&self) -> bool;
    /// Fire-and-forget emit. Errors when the channel is (or just went) down.
    fn emit(&self, command: &UserCommand) -> Result<(), DracoError>;
}

/// The stateless request/response path.
#[async_trait]
pub trait FallbackApi: Send {
    async fn send_command(&self, command: &UserCommand) -> Result<DracoReply, DracoError>;
}

/// Handle that replays the exact command captured at failure time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RetryTicket(Uuid);

/// Outcome of one dispatch cycle.
#[derive(Debug)]
pub enum Dispatch {
    /// The trimmed command was empty; nothing was sent anywhere.
    Empty,
    /// Emitted over the duplex channel; reply arrives via inbound events.
    Emitted,
    /// Fallback round-trip produced a reply.
    Reply(DracoReply),
    /// Fallback failed. `ticket` re-sends the identical command on request.
    Failed {
        error: DracoError,
        ticket: RetryTicket,
    },
}

/// Dispatches user commands over whichever path is available.
pub struct Dispatcher {
    duplex: Box<dyn DuplexLink>,
    fallback: Box<dyn FallbackApi>,
    retries: HashMap<RetryTicket, String>,
}

impl Dispatcher {
    pub fn new(duplex: Box<dyn DuplexLink>, fallback: Box<dyn FallbackApi>) -> Self {
        Self {
            duplex,
            fallback,
            retries: HashMap::new(),
        }
    }

    pub fn state(&self) -> TransportState {
        if self.duplex.is_open() {
            TransportState::Duplex
        } else {
            TransportState::Fallback
        }
    }

    /// Deliver `command` over the preferred available path.
    ///
    /// Never returns an error: failures are folded into the outcome so the
    /// caller can render them locally.
    pub async fn send(&mut self, command: &str) -> Dispatch {
        let text = command.trim();
        if text.is_empty() {
            return Dispatch::Empty;
        }
        let cmd = UserCommand::new(text);

        if self.duplex.is_open() {
            match self.duplex.emit(&cmd) {
                Ok(()) => return Dispatch::Emitted,
                // The channel closed between the check and the emit.
                Err(e) => warn!(error = %e, "duplex emit failed, using fallback"),
            }
        }

        match self.fallback.send_command(&cmd).await {
            Ok(reply) => Dispatch::Reply(reply),
            Err(error) => {
                let ticket = RetryTicket(Uuid::new_v4());
                self.retries.insert(ticket, cmd.text);
                Dispatch::Failed { error, ticket }
            }
        }
    }

    /// The command captured under `ticket`, if still registered.
    pub fn retry_command(&self, ticket: RetryTicket) -> Option<&str> {
        self.retries.get(&ticket).map(String::as_str)
    }

    /// Drop a captured command that will never be retried.
    pub fn forget(&mut self, ticket: RetryTicket) {
        self.retries.remove(&ticket);
    }

    /// Re-dispatch the command captured under `ticket`.
    ///
    /// Returns `None` for an unknown ticket. A retry that gets through (on
    /// either path) drops the ticket; a retry that fails again produces a
    /// fresh one inside the returned outcome.
    pub async fn retry(&mut self, ticket: RetryTicket) -> Option<Dispatch> {
        let text = self.retries.get(&ticket)?.clone();
        let outcome = self.send(&text).await;
        if matches!(outcome, Dispatch::Emitted | Dispatch::Reply(_)) {
            self.retries.remove(&ticket);
        }
        Some(outcome)
    }
}
