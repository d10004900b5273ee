use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use serde_json::json;

use gram_replay::{
    parse_agent_events, util, Cassette, ChatRuntime, Config, LocalRuntime, ReplayController,
    ReplayOptions, ReplayOutcome, ReplayTransport, SubAgentStore,
};

#[derive(Debug, Parser)]
#[command(name = "gram-replay", version, about = "Replay chat cassettes and inspect sub-agent trees")]
struct Cli {
    /// Config file (default: ~/.gram-replay/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (default: ~/.gram-replay)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Write logs to the data directory instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Replay a cassette, printing stream events as JSON lines
    Play(PlayArgs),
    /// Extract sub-agent markers from text and print the resulting tree
    Parse(ParseArgs),
}

#[derive(Debug, Args)]
struct PlayArgs {
    /// Cassette JSON file
    cassette: PathBuf,

    /// Milliseconds per streamed character
    #[arg(long)]
    typing_speed: Option<u64>,

    /// Milliseconds before each user message
    #[arg(long)]
    user_delay: Option<u64>,

    /// Milliseconds before each assistant turn
    #[arg(long)]
    assistant_delay: Option<u64>,

    /// Milliseconds between a tool call and its result
    #[arg(long)]
    tool_delay: Option<u64>,

    /// Disable all pacing
    #[arg(
        long,
        conflicts_with_all = ["typing_speed", "user_delay", "assistant_delay", "tool_delay"]
    )]
    instant: bool,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Text file to parse (default: stdin)
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::init_data_dir(cli.data_dir.clone());
    init_logging(cli.log_file)?;

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Play(args) => play(config, args).await,
        Command::Parse(args) => parse(config, args.file.as_deref()),
    }
}

fn init_logging(to_file: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    if to_file {
        fs::create_dir_all(util::logs_dir())?;
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(util::log_file_path())?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(log_file)
            .with_ansi(false) // Disable ANSI colors in log file
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
    Ok(())
}

fn replay_options(config: &Config, args: &PlayArgs) -> ReplayOptions {
    if args.instant {
        return ReplayOptions::instant();
    }

    let mut options = config.replay;
    if let Some(ms) = args.typing_speed {
        options = options.with_typing_speed(Duration::from_millis(ms));
    }
    if let Some(ms) = args.user_delay {
        options = options.with_user_message_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = args.assistant_delay {
        options = options.with_assistant_start_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = args.tool_delay {
        options = options.with_tool_result_delay(Duration::from_millis(ms));
    }
    options
}

async fn play(config: Config, args: PlayArgs) -> Result<()> {
    let options = replay_options(&config, &args);
    let cassette = Arc::new(
        Cassette::load(&args.cassette)
            .with_context(|| format!("loading cassette {}", args.cassette.display()))?,
    );

    let controller = ReplayController::new(cassette.clone(), options);
    let store = Arc::new(Mutex::new(SubAgentStore::new(config.agents)));
    let runtime = LocalRuntime::new(Arc::new(ReplayTransport::new(cassette, options)))
        .with_store(store.clone())
        .with_cancel_token(controller.cancel_token());

    runtime.on_stream_event(|event| match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!("Failed to encode stream event: {e}"),
    });
    controller.on_complete(|| tracing::info!("All user turns replayed"));

    let cancel = controller.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let outcome = controller.run(&runtime).await?;
    if outcome == ReplayOutcome::Cancelled {
        // Let the in-flight run record what it streamed before reporting
        let mut state = runtime.subscribe();
        let _ = state.wait_for(|s| !s.is_running).await;
    }

    let tree = store.lock().snapshot();
    let summary = json!({
        "outcome": outcome,
        "tree": &*tree,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse(config: Config, file: Option<&Path>) -> Result<()> {
    let text = match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let parsed = parse_agent_events(&text);
    let mut store = SubAgentStore::new(config.agents);
    for event in parsed.events {
        store.handle_event(event);
    }

    let mut expanded: Vec<String> = store.expanded_agents().into_iter().collect();
    expanded.sort();
    let tree = store.snapshot();
    let summary = json!({
        "clean_content": parsed.clean_content,
        "trailing_partial": parsed.trailing_partial,
        "tree": &*tree,
        "expanded": expanded,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
