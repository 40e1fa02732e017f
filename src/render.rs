//! Render seam between the session core and whatever displays it.
//!
//! The session never prints directly: every visible effect goes through
//! [`Render`], so the core runs headless in tests (see [`CaptureRender`])
//! and the binary plugs in [`TerminalRender`].

use colored::*;

use crate::memory::{format_line, MemoryEntry};
use crate::protocol::SourceLink;
use crate::store::KeyValueStore;
use crate::Who;

/// Visible connection state of the duplex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl std::fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportStatus::Connecting => write!(f, "Connecting..."),
            TransportStatus::Connected => write!(f, "Connected"),
            TransportStatus::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Assistant mode badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Listening,
    Speaking,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Idle => write!(f, "Idle"),
            Mode::Listening => write!(f, "Listening"),
            Mode::Speaking => write!(f, "Speaking"),
        }
    }
}

// -- Theme --------------------------------------------------------------------

/// Storage key for the persisted theme.
pub const THEME_KEY: &str = "draco-theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    /// Stored representation, shared with the dashboard variants.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light-mode",
            Theme::Dark => "dark-mode",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light-mode" => Some(Theme::Light),
            "dark-mode" => Some(Theme::Dark),
            _ => None,
        }
    }

    /// Read the persisted theme; anything unrecognized falls back to dark.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        store
            .get(THEME_KEY)
            .and_then(|raw| Theme::parse(&raw))
            .unwrap_or_default()
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), crate::error::DracoError> {
        store.set(THEME_KEY, self.as_str())
    }
}

// -- Render trait ----------------------------------------------------------------

/// Everything the session can make visible.
pub trait Render: Send {
    /// A conversation line from either side.
    fn message(&mut self, who: Who, text: &str);
    /// Show or hide the typing indicator.
    fn typing(&mut self, on: bool);
    /// Duplex connection status changed.
    fn status(&mut self, status: TransportStatus);
    /// Mode badge changed.
    fn mode(&mut self, mode: Mode);
    /// Labeled source links attached to a reply.
    fn sources(&mut self, sources: &[SourceLink]);
    /// A generated document is ready for download.
    fn document_ready(&mut self, url: &str);
    /// The backend asked the client to open an external page.
    fn open_url(&mut self, url: &str);
    /// Rebuild the memory panel.
    fn memory(&mut self, entries: &[MemoryEntry]);
}

// -- Terminal implementation -------------------------------------------------------

/// Colored terminal renderer.
pub struct TerminalRender {
    theme: Theme,
}

impl TerminalRender {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    fn accent(&self, s: &str) -> ColoredString {
        match self.theme {
            Theme::Dark => s.bright_cyan(),
            Theme::Light => s.blue(),
        }
    }

    fn bot_tint(&self, s: &str) -> ColoredString {
        match self.theme {
            Theme::Dark => s.bright_green(),
            Theme::Light => s.green(),
        }
    }
}

impl Render for TerminalRender {
    fn message(&mut self, who: Who, text: &str) {
        match who {
            Who::User => println!("{} {}", self.accent("You:").bold(), text),
            Who::Bot => println!("{} {}", self.bot_tint("Draco:").bold(), text),
        }
    }

    fn typing(&mut self, on: bool) {
        if on {
            println!("{}", "Draco is typing...".dimmed());
        }
    }

    fn status(&mut self, status: TransportStatus) {
        let line = format!("[bridge] {status}");
        let tinted = match status {
            TransportStatus::Connected => line.green(),
            TransportStatus::Connecting => line.yellow(),
            TransportStatus::Disconnected => line.red(),
        };
        println!("{tinted}");
    }

    fn mode(&mut self, mode: Mode) {
        println!("{}", format!("[mode] {mode}").dimmed());
    }

    fn sources(&mut self, sources: &[SourceLink]) {
        println!("{}", self.accent("Sources:"));
        for s in sources {
            println!("  {} {}", s.label.bold(), s.url.underline());
        }
    }

    fn document_ready(&mut self, url: &str) {
        println!(
            "{} {}",
            self.bot_tint("Document ready:"),
            url.underline()
        );
    }

    fn open_url(&mut self, url: &str) {
        println!("{} {}", self.accent("Open:"), url.underline());
    }

    fn memory(&mut self, entries: &[MemoryEntry]) {
        println!("{}", "Memory".bold());
        for entry in entries {
            println!("  {}", format_line(entry));
        }
    }
}

// -- Headless implementation ----------------------------------------------------

/// One recorded render effect.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Message(Who, String),
    Typing(bool),
    Status(TransportStatus),
    Mode(Mode),
    Sources(Vec<SourceLink>),
    DocumentReady(String),
    OpenUrl(String),
    Memory(Vec<String>),
}

/// Renderer that records effects instead of printing them.
///
/// Used by the test suites and by embedders that feed the conversation into
/// their own surface.
#[derive(Debug, Default)]
pub struct CaptureRender {
    pub events: Vec<RenderEvent>,
}

impl CaptureRender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience: texts of all rendered messages, in order.
    pub fn message_texts(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                RenderEvent::Message(_, text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Render for CaptureRender {
    fn message(&mut self, who: Who, text: &str) {
        self.events.push(RenderEvent::Message(who, text.to_string()));
    }

    fn typing(&mut self, on: bool) {
        self.events.push(RenderEvent::Typing(on));
    }

    fn status(&mut self, status: TransportStatus) {
        self.events.push(RenderEvent::Status(status));
    }

    fn mode(&mut self, mode: Mode) {
        self.events.push(RenderEvent::Mode(mode));
    }

    fn sources(&mut self, sources: &[SourceLink]) {
        self.events.push(RenderEvent::Sources(sources.to_vec()));
    }

    fn document_ready(&mut self, url: &str) {
        self.events.push(RenderEvent::DocumentReady(url.to_string()));
    }

    fn open_url(&mut self, url: &str) {
        self.events.push(RenderEvent::OpenUrl(url.to_string()));
    }

    fn memory(&mut self, entries: &[MemoryEntry]) {
        self.events
            .push(RenderEvent::Memory(entries.iter().map(format_line).collect()));
    }
}
