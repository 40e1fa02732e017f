//! Draco client core: one conversational session over two transports.
//!
//! ## Design
//! - [`Session`] owns everything the dashboard owned as globals: the
//!   [`transport::Dispatcher`], the [`memory::MemoryLog`], and the
//!   [`render::Render`] target are injected at construction.
//! - Sending is optimistic: the user line is rendered and remembered before
//!   any network activity starts.
//! - Reply processing is shared by both transports: text, sources, an
//!   `open_url` action, and a document link each render independently.
//! - Busy state covers exactly one conversational turn and is cleared on
//!   every completion path.

pub mod cli;
pub mod config;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod render;
pub mod speech;
pub mod store;
pub mod transport;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use config::ClientConfig;
pub use error::DracoError;

use memory::MemoryLog;
use protocol::{DracoReply, ReplyAction};
use render::{Mode, Render, TransportStatus};
use transport::http::ApiClient;
use transport::{Dispatch, Dispatcher, InboundEvent, RetryTicket};

/// Which side of the conversation a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Who {
    User,
    Bot,
}

/// One conversation line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub who: Who,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            who: Who::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            who: Who::Bot,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A running conversation: dispatch, memory, and rendering glued together.
pub struct Session {
    dispatcher: Dispatcher,
    memory: MemoryLog,
    render: Box<dyn Render>,
    busy: bool,
    last_failure: Option<RetryTicket>,
}

impl Session {
    pub fn new(dispatcher: Dispatcher, memory: MemoryLog, render: Box<dyn Render>) -> Self {
        Self {
            dispatcher,
            memory,
            render,
            busy: false,
            last_failure: None,
        }
    }

    /// Startup lines: the ready banner, capability announcements, and the
    /// persisted memory panel.
    pub fn start(&mut self, speech_available: bool) {
        self.render.message(
            Who::Bot,
            "Draco Dashboard ready. Connect bridge and speak to Draco.",
        );
        if !speech_available {
            self.render.message(
                Who::Bot,
                "Voice recognition not supported in this environment.",
            );
        }
        self.memory.render(self.render.as_mut());
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Replay backend-side history into the conversation view.
    ///
    /// Failure here is never fatal; the session just starts without the
    /// replayed lines.
    pub async fn load_history(&mut self, api: &ApiClient) {
        match api.chat_history().await {
            Ok(resp) if resp.ok => {
                for item in resp.items {
                    let message = if item.who == "user" {
                        Message::user(item.text)
                    } else {
                        Message::bot(item.text)
                    };
                    self.render.message(message.who, &message.text);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "chat history unavailable"),
        }
    }

    /// Send one user command through whichever transport is available.
    ///
    /// Empty commands are no-ops. Failures never escape: they surface as
    /// locally rendered lines with a retry handle behind [`Session::retry_last`].
    pub async fn send(&mut self, command: &str) {
        let text = command.trim().to_string();
        if text.is_empty() {
            return;
        }
        if self.busy {
            self.render
                .message(Who::Bot, "Still working on the previous command.");
            return;
        }

        // Optimistic logging: the line exists before the network is touched.
        self.render.message(Who::User, &text);
        self.remember(format!("You: {text}"));
        self.busy = true;
        self.render.typing(true);

        match self.dispatcher.send(&text).await {
            // Reply arrives later through handle_event; stay busy until then.
            Dispatch::Emitted => {}
            Dispatch::Reply(reply) => self.complete_with_reply(&reply),
            Dispatch::Failed { error, ticket } => {
                self.render.typing(false);
                self.busy = false;
                self.render.message(
                    Who::Bot,
                    &format!("Could not reach Draco ({error}). Use retry to resend."),
                );
                if let Some(old) = self.last_failure.replace(ticket) {
                    self.dispatcher.forget(old);
                }
            }
            Dispatch::Empty => {
                // Trimmed above; kept so a future dispatcher change cannot
                // leave the session busy.
                self.render.typing(false);
                self.busy = false;
            }
        }
    }

    /// Re-send the most recent failed command. Explicit user action only;
    /// nothing is ever retried automatically.
    ///
    /// Returns `false` when there is nothing to retry.
    pub async fn retry_last(&mut self) -> bool {
        let Some(ticket) = self.last_failure.take() else {
            return false;
        };
        let Some(text) = self.dispatcher.retry_command(ticket).map(str::to_string) else {
            return false;
        };
        self.dispatcher.forget(ticket);
        self.send(&text).await;
        true
    }

    /// Process one inbound duplex event (reply or connection transition).
    pub fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Reply(reply) => self.complete_with_reply(&reply),
            InboundEvent::Status(status) => {
                self.render.status(status);
                match status {
                    TransportStatus::Connected => {
                        self.render
                            .message(Who::Bot, "Dashboard connected to Draco bridge.");
                    }
                    TransportStatus::Disconnected => {
                        self.render.message(
                            Who::Bot,
                            "Disconnected from Draco bridge. Reconnecting shortly...",
                        );
                        // A closed channel can never deliver the pending
                        // reply; holding busy would wedge the session.
                        if self.busy {
                            self.render.typing(false);
                            self.busy = false;
                        }
                    }
                    TransportStatus::Connecting => {}
                }
            }
        }
    }

    /// Shared reply processing for both transports. Each present field
    /// triggers its own rendering action; fields are not mutually exclusive.
    fn complete_with_reply(&mut self, reply: &DracoReply) {
        self.render.typing(false);
        self.busy = false;

        if let Some(err) = &reply.error {
            self.render.message(Who::Bot, err);
        }
        if let Some(text) = &reply.text {
            self.render.message(Who::Bot, text);
            self.remember(format!("Draco: {text}"));
            self.render.mode(Mode::Speaking);
            self.render.mode(Mode::Idle);
        }
        if reply.action == Some(ReplyAction::OpenUrl) {
            if let Some(url) = &reply.url {
                self.render.open_url(url);
            }
        }
        if !reply.sources_labeled.is_empty() {
            self.render.sources(&reply.sources_labeled);
        }
        if let Some(doc) = &reply.doc {
            self.render.document_ready(doc);
        }
    }

    /// Append to the rolling memory and rebuild its panel.
    fn remember(&mut self, line: String) {
        if let Err(e) = self.memory.record(line) {
            warn!(error = %e, "memory write failed");
        }
        self.memory.render(self.render.as_mut());
    }

    /// Wipe the rolling memory and rebuild its (now empty) panel.
    pub fn clear_memory(&mut self) {
        if let Err(e) = self.memory.clear() {
            warn!(error = %e, "memory clear failed");
        }
        self.memory.render(self.render.as_mut());
    }

    /// Rebuild the memory panel from the persisted sequence.
    pub fn show_memory(&mut self) {
        self.memory.render(self.render.as_mut());
    }
}
