//! Among LLMs headless CLI.
//!
//! # Commands
//!
//! - `play` - Run a chatroom against an LLM endpoint or the offline script
//! - `transcript` - Export a saved chatroom as a transcript
//! - `inspect` - Summarize a saved chatroom

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use allms::{
    chat::formatter,
    state::persist,
    ChannelUi, ChatTurn, Config, GameError, GameState, GameStateManager, LlmClient, OpenAiClient,
    OutgoingMessage, ScriptedClient, UiEvent, VERSION,
};
use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;
use rand::Rng;

const PERSONAS: &[&str] = &[
    "a soft-spoken librarian who notices everything",
    "a loud sports fan who jokes constantly",
    "a retired sea captain full of stories",
    "a sarcastic software engineer",
    "an anxious first-year medical student",
    "a cheerful street food vendor",
    "a conspiracy-minded night-shift security guard",
    "a meticulous accountant who hates small talk",
];

const SCRIPTED_LINES: &[&str] = &[
    "Did anyone else hear that noise a minute ago?",
    "I'm keeping an eye on everyone, just so you know.",
    "That answer felt a little too rehearsed.",
    "Let's stay calm and compare notes.",
    "Funny how some people only speak when spoken to.",
    "I trust nobody here yet.",
];

#[derive(Parser)]
#[command(name = "allms")]
#[command(version = VERSION)]
#[command(about = "Among LLMs - find the human hiding among the agents", long_about = None)]
struct Cli {
    /// Configuration file (TOML); ALLMS_* environment variables apply otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a chatroom headless, printing messages as they arrive
    Play {
        /// Agent ids
        #[arg(short, long, value_delimiter = ',', default_value = "alice,bob,carol,dave,erin")]
        agents: Vec<String>,

        /// Agent the human plays (stays silent unless --opening is given)
        #[arg(short, long, default_value = "bob")]
        you: String,

        /// Scenario genre
        #[arg(long, default_value = "mystery")]
        genre: String,

        /// Scenario text
        #[arg(
            long,
            default_value = "A storm has trapped a group of strangers in a mountain lodge overnight."
        )]
        scenario: String,

        /// Message the human sends once the room starts
        #[arg(long)]
        opening: Option<String>,

        /// Use the offline script instead of the configured endpoint
        #[arg(long)]
        scripted: bool,

        /// Stop after this many seconds
        #[arg(short, long, default_value = "300")]
        duration: u64,

        /// Save the chatroom when done
        #[arg(long)]
        save: bool,

        /// Save path (default: the storage directory)
        #[arg(long)]
        save_to: Option<PathBuf>,
    },

    /// Export a saved chatroom as a transcript
    Transcript {
        /// Save file
        path: PathBuf,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Summarize a saved chatroom
    Inspect {
        /// Save file
        path: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            agents,
            you,
            genre,
            scenario,
            opening,
            scripted,
            duration,
            save,
            save_to,
        } => cmd_play(
            config,
            PlayOptions {
                agents,
                you,
                genre,
                scenario,
                opening,
                scripted,
                duration: Duration::from_secs(duration),
                save: save || save_to.is_some(),
                save_to,
            },
        ),
        Commands::Transcript { path, output } => cmd_transcript(&config, &path, output),
        Commands::Inspect { path, json } => cmd_inspect(&config, &path, json),
    }
}

struct PlayOptions {
    agents: Vec<String>,
    you: String,
    genre: String,
    scenario: String,
    opening: Option<String>,
    scripted: bool,
    duration: Duration,
    save: bool,
    save_to: Option<PathBuf>,
}

fn cmd_play(config: Config, options: PlayOptions) -> anyhow::Result<()> {
    let PlayOptions {
        agents,
        you,
        genre,
        scenario,
        opening,
        scripted,
        duration,
        save,
        save_to,
    } = options;

    let mut personas = PERSONAS.to_vec();
    personas.shuffle(&mut rand::thread_rng());
    let roster: Vec<(String, String)> = agents
        .iter()
        .zip(personas.iter().cycle())
        .map(|(id, persona)| (id.clone(), (*persona).to_string()))
        .collect();

    let state = GameState::new(&config.game, genre, scenario, roster, you.clone())?;

    let llm: Arc<dyn LlmClient> = if scripted {
        Arc::new(scripted_client(agents))
    } else {
        Arc::new(OpenAiClient::new(config.llm.clone())?)
    };
    tracing::info!("Using model {}", llm.model());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (ui, mut events) = ChannelUi::new();
        let manager = GameStateManager::new(config, state, llm, Arc::new(ui))?;
        manager.start_llms().await?;

        if let Some(text) = opening {
            manager
                .send_message(OutgoingMessage::new(you, text).by_human())
                .await?;
        }

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = &mut deadline => {
                    tracing::info!("Time limit reached");
                    break;
                }
                event = events.recv() => match event {
                    Some(UiEvent::NewMessage(id)) => {
                        if let Some(msg) = manager.message(id).await {
                            println!("{}", formatter::format_to_string(&msg));
                        }
                    }
                    Some(UiEvent::EventAnnounced(text)) => println!(">> {text}"),
                    Some(UiEvent::GameEnded { conclusion, .. }) => {
                        println!("{conclusion}");
                        break;
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        manager.close_chatroom();
        if save {
            let path = manager.save_chatroom(save_to.as_deref()).await?;
            println!("Saved to {}", path.display());
        }
        Ok::<_, anyhow::Error>(())
    })
}

fn cmd_transcript(config: &Config, path: &Path, output: Option<PathBuf>) -> anyhow::Result<()> {
    let state = persist::load(path, &config.game)?;
    let transcript = formatter::export_transcript(state.messages(), state.your_agent_id());
    write_output(output, &transcript)
}

fn cmd_inspect(config: &Config, path: &Path, json: bool) -> anyhow::Result<()> {
    let state = persist::load(path, &config.game)?;
    let remaining: Vec<&String> = state.remaining_agent_ids().iter().collect();
    let terminated: Vec<String> = state.terminated_agent_ids().into_iter().collect();
    let status = match (state.game_ended, state.game_won) {
        (false, _) => "in progress",
        (true, true) => "won",
        (true, false) => "lost",
    };

    if json {
        let summary = serde_json::json!({
            "chatroom_id": state.chatroom_id,
            "genre": state.genre,
            "scenario": state.scenario,
            "you": state.your_agent_id(),
            "remaining": remaining,
            "terminated": terminated,
            "messages": state.messages().len(),
            "events": state.events().len(),
            "elapsed_ms": state.elapsed_duration,
            "status": status,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Chatroom:   {}", state.chatroom_id);
    println!("Genre:      {}", state.genre);
    println!("Scenario:   {}", state.scenario);
    println!("You:        {}", state.your_agent_id());
    println!("Remaining:  {}", join(remaining.iter().map(|s| s.as_str())));
    println!("Terminated: {}", join(terminated.iter().map(String::as_str)));
    println!("Messages:   {}", state.messages().len());
    println!("Elapsed:    {}s", state.elapsed_duration / 1000);
    println!("Status:     {status}");
    Ok(())
}

// Helper functions

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let env = Config::from_env();
    match path {
        Some(path) => Ok(env.merge(Config::from_file(path)?)),
        None => {
            env.game.validate()?;
            Ok(env)
        }
    }
}

fn write_output(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}

/// Offline client: canned lines, random suspicions and the occasional vote
fn scripted_client(agent_ids: Vec<String>) -> ScriptedClient {
    ScriptedClient::from_fn(move |messages| {
        let speaker = speaking_agent(messages)
            .ok_or_else(|| GameError::Llm("request names no speaker".to_string()))?;
        let others: Vec<&String> = agent_ids
            .iter()
            .filter(|id| !id.eq_ignore_ascii_case(&speaker))
            .collect();

        let mut rng = rand::thread_rng();
        let line = SCRIPTED_LINES.choose(&mut rng).copied().unwrap_or("...");
        let suspect = others.choose(&mut rng).map_or("None", |s| s.as_str());
        let confidence = rng.gen_range(10..=95);
        let vote = rng.gen_bool(0.15);

        Ok(format!(
            "MESSAGE: {line}\n\
             INTENT: keep the others talking\n\
             SEND_TO: None\n\
             SUSPECT_ID: {suspect}\n\
             SUSPECT_CONFIDENCE: {confidence}\n\
             REASON_FOR_SUSPECT: gut feeling\n\
             START_A_VOTE: {}\n\
             VOTING_FOR: {}",
            if vote { "True" } else { "False" },
            if vote { suspect } else { "None" },
        ))
    })
}

/// Agent id named by the per-turn input prompt
fn speaking_agent(messages: &[ChatTurn]) -> Option<String> {
    messages.iter().rev().find_map(|turn| {
        let rest = turn.content.strip_prefix("**YOU ARE ")?;
        let end = rest.find("**")?;
        Some(rest[..end].to_string())
    })
}
