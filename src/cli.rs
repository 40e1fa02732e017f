use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

use crate::config::ClientConfig;
use crate::error::DracoError;
use crate::render::Theme;

#[derive(Parser)]
#[command(name = "draco-client")]
#[command(version = "3.1.0")]
#[command(about = "Terminal client for the Draco assistant: duplex bridge with HTTP fallback")]
pub struct Args {
    /// One-shot command to send (omit to start the interactive dashboard)
    pub command: Option<String>,

    /// Backend HTTP base URL (default http://127.0.0.1:5000)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Duplex bridge URL (default ws://127.0.0.1:8765)
    #[arg(long)]
    pub ws_url: Option<String>,

    /// TOML config file; explicit flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Show the persisted memory panel and exit
    #[arg(long)]
    pub memory: bool,

    /// Clear the persisted memory and exit
    #[arg(long)]
    pub clear_memory: bool,

    /// Fetch and print backend chat history, then exit
    #[arg(long)]
    pub history: bool,

    /// List available chats, then exit
    #[arg(long)]
    pub chats: bool,

    /// Select the active chat by id, then exit
    #[arg(long)]
    pub select_chat: Option<String>,

    /// Show the guest profile, then exit
    #[arg(long)]
    pub profile: bool,

    /// Store a profile name, then exit (combine with --language / --mood)
    #[arg(long)]
    pub name: Option<String>,

    /// Store a profile language, then exit
    #[arg(long)]
    pub language: Option<String>,

    /// Store a profile mood, then exit
    #[arg(long)]
    pub mood: Option<String>,

    /// Clear the stored profile, then exit
    #[arg(long)]
    pub clear_profile: bool,

    /// Target the signed-in profile endpoints instead of the guest ones
    #[arg(long)]
    pub account: bool,

    /// Upload a document for processing, then exit
    #[arg(long)]
    pub upload: Option<PathBuf>,

    /// Instruction accompanying --upload
    #[arg(long, default_value = "summarize")]
    pub instruction: String,

    /// Theme: light or dark (persisted for later runs)
    #[arg(long)]
    pub theme: Option<String>,

    /// Path of the local state store
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Keep local state in SQLite instead of a JSON file
    #[arg(long)]
    pub sqlite: bool,

    /// Run without persisting any local state
    #[arg(long)]
    pub ephemeral: bool,

    /// Generate shell completions and exit
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

/// Assemble the effective config: defaults, then the config file, then any
/// explicit flags on top.
pub fn resolve_config(args: &Args) -> Result<ClientConfig, DracoError> {
    let mut cfg = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(base) = &args.base_url {
        cfg.http_base = base.clone();
    }
    if let Some(ws) = &args.ws_url {
        cfg.ws_url = ws.clone();
    }
    Ok(cfg)
}

/// Accept both the stored theme names and their short forms.
pub fn resolve_theme(s: &str) -> Option<Theme> {
    match s {
        "light" => Some(Theme::Light),
        "dark" => Some(Theme::Dark),
        other => Theme::parse(other),
    }
}

/// True when the invocation is a dashboard data operation that runs once and
/// exits instead of opening a conversation.
pub fn is_one_shot_op(args: &Args) -> bool {
    args.memory
        || args.clear_memory
        || args.history
        || args.chats
        || args.select_chat.is_some()
        || args.profile
        || profile_update(args).is_some()
        || args.clear_profile
        || args.upload.is_some()
        || args.completions.is_some()
}

/// The profile update requested by `--name` / `--language` / `--mood`, if any.
pub fn profile_update(args: &Args) -> Option<crate::protocol::UserProfile> {
    if args.name.is_none() && args.language.is_none() && args.mood.is_none() {
        return None;
    }
    Some(crate::protocol::UserProfile {
        name: args.name.clone(),
        language: args.language.clone(),
        mood: args.mood.clone(),
    })
}
