use clap::{CommandFactory, Parser};
use colored::*;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use draco_client::cli::{self, Args};
use draco_client::config::ClientConfig;
use draco_client::memory::MemoryLog;
use draco_client::render::{Render, TerminalRender, Theme, TransportStatus};
use draco_client::speech::{NoSpeech, SpeechInput};
use draco_client::store::{JsonFileStore, KeyValueStore, MemoryStore, SqliteStore};
use draco_client::transport::duplex::DuplexChannel;
use draco_client::transport::http::{ApiClient, UploadProgress};
use draco_client::transport::{Dispatcher, InboundEvent};
use draco_client::{Session, Who};

/// Default local-state file names, created in the working directory unless
/// `--store` points elsewhere.
const DEFAULT_JSON_STORE: &str = "draco_state.json";
const DEFAULT_SQLITE_STORE: &str = "draco_state.db";

fn open_store(args: &Args) -> Result<Box<dyn KeyValueStore>, Box<dyn std::error::Error>> {
    if args.ephemeral {
        return Ok(Box::new(MemoryStore::new()));
    }
    if args.sqlite {
        let path = args
            .store
            .clone()
            .unwrap_or_else(|| DEFAULT_SQLITE_STORE.into());
        return Ok(Box::new(SqliteStore::open(path)?));
    }
    let path = args
        .store
        .clone()
        .unwrap_or_else(|| DEFAULT_JSON_STORE.into());
    Ok(Box::new(JsonFileStore::open(path)))
}

/// Give the bridge one chance to come up before the first send, so a backend
/// that is actually running gets the duplex path from the start.
async fn await_bridge(
    session: &mut Session,
    events: &mut mpsc::UnboundedReceiver<InboundEvent>,
    config: &ClientConfig,
) {
    let _ = tokio::time::timeout(config.connect_timeout, async {
        while let Some(event) = events.recv().await {
            let settled = matches!(
                event,
                InboundEvent::Status(TransportStatus::Connected)
                    | InboundEvent::Status(TransportStatus::Disconnected)
            );
            session.handle_event(event);
            if settled {
                break;
            }
        }
    })
    .await;
}

/// Dashboard data operations that run once and exit.
async fn run_dashboard_op(
    args: &Args,
    api: &ApiClient,
    store: Box<dyn KeyValueStore>,
    theme: Theme,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut render = TerminalRender::new(theme);

    if args.memory {
        MemoryLog::new(store).render(&mut render);
        return Ok(());
    }
    if args.clear_memory {
        let mut memory = MemoryLog::new(store);
        memory.clear()?;
        memory.render(&mut render);
        println!("{}", "Memory cleared.".dimmed());
        return Ok(());
    }
    if args.history {
        let resp = api.chat_history().await?;
        for item in resp.items {
            let who = if item.who == "user" { Who::User } else { Who::Bot };
            render.message(who, &item.text);
        }
        return Ok(());
    }
    if args.chats {
        let resp = api.chats().await?;
        for chat in resp.chats {
            println!("{}  {}", chat.id.bold(), chat.name);
        }
        return Ok(());
    }
    if let Some(chat_id) = &args.select_chat {
        let ack = api.select_chat(chat_id).await?;
        if ack.ok {
            println!("Selected chat {chat_id}.");
        } else {
            println!(
                "Could not select chat: {}",
                ack.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        return Ok(());
    }
    if args.profile {
        let resp = api.guest_profile().await?;
        match resp.profile {
            Some(profile) => {
                println!("name:     {}", profile.name.as_deref().unwrap_or("-"));
                println!("language: {}", profile.language.as_deref().unwrap_or("-"));
                println!("mood:     {}", profile.mood.as_deref().unwrap_or("-"));
            }
            None => println!("No profile stored."),
        }
        return Ok(());
    }
    if let Some(profile) = cli::profile_update(args) {
        let ack = api.set_profile(&profile, !args.account).await?;
        if ack.ok {
            println!("Profile updated.");
        } else {
            println!(
                "Profile update failed: {}",
                ack.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        return Ok(());
    }
    if args.clear_profile {
        api.clear_profile(!args.account).await?;
        println!("Profile cleared.");
        return Ok(());
    }
    if let Some(path) = &args.upload {
        let (tx, mut rx) = mpsc::unbounded_channel::<UploadProgress>();
        let printer = tokio::spawn(async move {
            while let Some(p) = rx.recv().await {
                let pct = if p.total == 0 {
                    100
                } else {
                    p.sent * 100 / p.total
                };
                eprintln!("uploading... {pct}% ({}/{} bytes)", p.sent, p.total);
            }
        });
        let outcome = api
            .upload_process(path, &args.instruction, Some(tx))
            .await?;
        let _ = printer.await;

        if let Some(err) = &outcome.error {
            println!("{} {err}", "Processing failed:".red());
        }
        if let Some(summary) = &outcome.summary {
            render.message(Who::Bot, summary);
        }
        if let Some(text) = &outcome.text {
            render.message(Who::Bot, text);
        }
        if let Some(doc) = &outcome.doc {
            render.document_ready(doc);
        }
        return Ok(());
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Some(shell) = args.completions {
        let mut cmd = Args::command();
        clap_complete::generate(shell, &mut cmd, "draco-client", &mut std::io::stdout());
        return Ok(());
    }

    let config = cli::resolve_config(&args)?;
    let mut store = open_store(&args)?;

    if let Some(raw) = &args.theme {
        match cli::resolve_theme(raw) {
            Some(theme) => theme.save(store.as_mut())?,
            None => return Err(format!("unknown theme: {raw} (use light or dark)").into()),
        }
    }
    let theme = Theme::load(store.as_ref());

    let api = ApiClient::new(&config);

    if cli::is_one_shot_op(&args) {
        return run_dashboard_op(&args, &api, store, theme).await;
    }

    // Conversation mode: duplex channel, dispatcher, session.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let channel = DuplexChannel::spawn(&config, events_tx);
    let dispatcher = Dispatcher::new(Box::new(channel), Box::new(api.clone()));
    let mut session = Session::new(
        dispatcher,
        MemoryLog::new(store),
        Box::new(TerminalRender::new(theme)),
    );

    session.start(SpeechInput::is_available(&NoSpeech));
    await_bridge(&mut session, &mut events_rx, &config).await;
    session.load_history(&api).await;

    if let Some(command) = &args.command {
        session.send(command).await;
        // Over the duplex path the reply arrives asynchronously.
        while session.is_busy() {
            match events_rx.recv().await {
                Some(event) => session.handle_event(event),
                None => break,
            }
        }
        return Ok(());
    }

    // Interactive dashboard: multiplex stdin lines with inbound events.
    println!(
        "{}",
        "Type a command. /retry re-sends a failed one, /memory shows the log, /quit exits."
            .dimmed()
    );
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => session.handle_event(event),
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(line) => match line.trim() {
                    "" => {}
                    "/quit" | "/exit" => break,
                    "/retry" => {
                        if !session.retry_last().await {
                            println!("{}", "Nothing to retry.".dimmed());
                        }
                    }
                    "/memory" => session.show_memory(),
                    "/clear-memory" => session.clear_memory(),
                    text => session.send(text).await,
                },
                None => break, // stdin closed
            },
        }
    }

    Ok(())
}
