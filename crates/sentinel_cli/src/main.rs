mod commands;
mod onboarding;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use commands::Command;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sentinel_core::{Clock, SentinelConfig, SystemClock, TaskDraft, TaskPatch};
use sentinel_memory::{Records, SqliteStore};
use sentinel_reasoning::providers::build_client;
use sentinel_reasoning::{GenerateOutcome, Session, TurnOutcome, VaultThenEnv};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "sentinel.toml", env = "SENTINEL_CONFIG")]
    config: PathBuf,

    /// SQLite database path (overrides the config)
    #[arg(short, long, env = "SENTINEL_DB")]
    db: Option<String>,

    /// Model provider: gemini, anthropic, openai or mock
    #[arg(short, long)]
    provider: Option<String>,

    /// Model name
    #[arg(short, long)]
    model: Option<String>,

    /// Also write a daily-rolling log file into this directory
    #[arg(long, env = "SENTINEL_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

/// The returned guard must stay alive for the file writer to flush.
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sentinel.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr_layer).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_dir.as_ref());

    let mut config = SentinelConfig::load_or_default(&args.config);
    if let Some(db) = args.db {
        config.store.db_path = db;
    }
    if let Some(provider) = args.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }

    info!("Initializing Sentinel...");
    // /key fills the vault and /purge empties it; the environment key stays.
    let credentials = Arc::new(VaultThenEnv::new(&config.llm.api_key_env));

    info!("Connecting to store at {}...", config.store.db_path);
    let store = Arc::new(SqliteStore::new(&config.store.db_path).await?);
    let records = Records::new(store);

    let client = build_client(&config.llm, credentials.clone())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut session = Session::new(&config, client, credentials.clone(), records, clock.clone());
    let boot = session.bootstrap().await?;
    if boot.pruned > 0 {
        info!("Decayed {} stale friction log(s)", boot.pruned);
    }

    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    println!("Sentinel online. Type /help for commands, /quit to exit.");
    if let Some(report) = &session.state().latest_report {
        println!("{}", render::weekly(report));
    }
    if let Some(banner) = &session.state().error {
        println!("[!] {}", banner);
    }

    if !boot.onboarded {
        println!("No dossier on file. Let's calibrate.");
        let baseline = onboarding::collect(|prompt| readline(&mut editor, prompt))?;
        match baseline {
            Some(baseline) => {
                let mark = session.state().messages.len();
                let outcome = session.complete_onboarding(baseline).await?;
                print_turn(&session, mark, &outcome);
            }
            None => {
                println!("Onboarding aborted.");
                session.shutdown().await;
                return Ok(());
            }
        }
    }

    while let Some(line) = readline(&mut editor, "> ")? {
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }
        let command = match commands::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(cmd) => cmd,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };
        if let Err(e) = dispatch(&mut session, &credentials, clock.as_ref(), &mut editor, command).await {
            error!("Command failed: {:#}", e);
            println!("[System Error]: {}", e);
        }
    }

    session.shutdown().await;
    info!("Sentinel offline.");
    Ok(())
}

/// Blocking read on the runtime's worker; `None` on Ctrl-D.
fn readline(editor: &mut DefaultEditor, prompt: &str) -> Result<Option<String>> {
    loop {
        match tokio::task::block_in_place(|| editor.readline(prompt)) {
            Ok(line) => return Ok(Some(line)),
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => return Ok(None),
            Err(e) => return Err(e).context("Failed to read input"),
        }
    }
}

fn print_turn(session: &Session, mark: usize, outcome: &TurnOutcome) {
    for msg in session.state().messages.iter().skip(mark) {
        if let Some(line) = render::message(msg) {
            println!("{}", line);
        }
    }
    match outcome {
        TurnOutcome::CoolingDown(secs) => println!("Cooling down, {}s left.", secs),
        TurnOutcome::Cancelled => println!("  [cancelled]"),
        TurnOutcome::Failed(_) => {
            if let Some(banner) = &session.state().error {
                println!("[!] {}", banner);
            }
        }
        TurnOutcome::Empty | TurnOutcome::Completed { .. } => {}
    }
}

async fn dispatch(
    session: &mut Session,
    credentials: &VaultThenEnv,
    clock: &dyn Clock,
    editor: &mut DefaultEditor,
    command: Command,
) -> Result<()> {
    match command {
        Command::Chat(text) => {
            let mark = session.state().messages.len();
            let token = CancellationToken::new();
            let trigger = token.clone();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    trigger.cancel();
                }
            });
            let progress = show_progress(session);
            let outcome = session.send_message(&text, token).await;
            watcher.abort();
            progress.abort();
            print_turn(session, mark, &outcome?);
        }
        Command::Help => println!("{}", commands::HELP),
        Command::Schedule => match &session.state().schedule {
            Some(s) => println!("{}", render::schedule(s, clock.wall_time())),
            None => println!("No temporal map yet. Try /generate."),
        },
        Command::Generate => {
            let progress = show_progress(session);
            let outcome = session.generate_schedule().await;
            progress.abort();
            match outcome? {
                GenerateOutcome::Generated(s) => println!("{}", render::schedule(&s, clock.wall_time())),
                GenerateOutcome::Unchanged { reason } => {
                    println!("Temporal map unchanged ({}).", reason)
                }
            }
        }
        Command::Add {
            start,
            duration,
            kind,
            title,
        } => {
            let task = session
                .add_task(TaskDraft::new(&title, start, duration, kind))
                .await?;
            println!("Added '{}' at {} ({})", task.title, task.start_time, task.id);
        }
        Command::Move { id, start } => {
            let patch = TaskPatch {
                start_time: Some(start),
                ..TaskPatch::default()
            };
            session.update_task(&id, patch).await?;
            show_task(session, &id);
        }
        Command::Done(id) => {
            session.toggle_complete(&id).await?;
            show_task(session, &id);
        }
        Command::Delete(id) => {
            session.delete_task(&id).await?;
            println!("Removed {} (if it existed).", id);
        }
        Command::Friction { id, reason } => {
            session.log_friction(&id, &reason).await?;
            let mark = session.state().messages.len();
            session.drain_notices();
            for msg in session.state().messages.iter().skip(mark) {
                if let Some(line) = render::message(msg) {
                    println!("{}", line);
                }
            }
        }
        Command::Report => {
            let outcome = session.generate_weekly_report().await?;
            println!("{}", render::report_outcome(&outcome, render::weekly));
        }
        Command::Clinical(kind) => {
            let outcome = session.generate_clinical_report(kind).await?;
            println!("{}", render::report_outcome(&outcome, render::clinical));
        }
        Command::History => {
            let history = session.clinical_history().await?;
            if history.is_empty() {
                println!("No clinical reports on file.");
            }
            for report in &history {
                println!("{}\n", render::clinical(report));
            }
        }
        Command::Key(key) => {
            credentials.store(&key);
            println!("Key held in memory for this session.");
        }
        Command::Status => {
            let state = session.state();
            println!(
                "{}",
                render::status(
                    session.intensity(),
                    session.cooldown_remaining(),
                    state.error.as_deref()
                )
            );
        }
        Command::Purge => {
            let confirm = readline(editor, "Type PURGE to erase every record: ")?;
            if confirm.as_deref().map(str::trim) == Some("PURGE") {
                session.purge().await?;
                println!("All records erased. Restart to onboard again.");
            } else {
                println!("Purge cancelled.");
            }
        }
        Command::Quit => {}
    }
    Ok(())
}

/// Print each status the session publishes until aborted.
fn show_progress(session: &Session) -> JoinHandle<()> {
    let mut status = session.subscribe_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            if let Some(line) = status.borrow_and_update().as_deref().map(render::progress) {
                println!("{}", line);
            }
        }
    })
}

fn show_task(session: &Session, id: &str) {
    match session.state().schedule.as_ref().and_then(|s| s.task(id)) {
        Some(t) => println!("{} {} {}m {:?}", t.start_time, t.title, t.duration, t.status),
        None => println!("No task with id {}.", id),
    }
}
