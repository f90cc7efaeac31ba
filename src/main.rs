use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use tour_guide::config::ProviderConfig;
use tour_guide::db::{self, SettingsStore};
use tour_guide::{Config, Location, TourGuide};

/// Tour guide - ask about places, photos and sights, hear the answers
#[derive(Parser)]
#[command(name = "tour-guide", version, about)]
struct Cli {
    /// Current location as "lat,lon" or "lat,lon,place name"
    #[arg(short, long, env = "TOUR_GUIDE_LOCATION")]
    location: Option<Location>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Describe a photo (JPEG)
    Photo {
        /// Path to the photo
        path: PathBuf,
    },
    /// Transcribe a recorded question (16 kHz mono WAV)
    Listen {
        /// Path to the recording
        path: PathBuf,
    },
    /// Speak text with the configured voice
    Speak {
        /// Text to speak
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Interactive conversation
    Chat,
    /// Interactive settings wizard
    Setup,
    /// Show the effective settings (secrets masked)
    ShowConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,tour_guide=info",
        1 => "info,tour_guide=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let pool = db::init(config.database_path())?;
    let store = SettingsStore::new(pool);

    match cli.command {
        Command::Setup => tour_guide::setup::run_setup(&store),
        Command::ShowConfig => show_config(&config, &store),
        command => {
            let provider = provider_config(&store)?;
            let voice = store.voice_config()?.unwrap_or_default();
            let guide = TourGuide::from_config(&config, provider, voice)?;
            guide.update_location(cli.location).await;
            run_guide(&guide, command).await
        }
    }
}

async fn run_guide(guide: &TourGuide, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Ask { question } => {
            let reply = guide.ask(&question.join(" ")).await?;
            println!("{}", reply.text);
            reply.speech.wait().await?;
        }
        Command::Photo { path } => {
            let reply = guide
                .describe_photo(&path)
                .await
                .with_context(|| format!("failed to describe {}", path.display()))?;
            println!("{}", reply.text);
            reply.speech.wait().await?;
        }
        Command::Listen { path } => {
            let text = guide.transcribe(&path).await?;
            println!("{text}");
        }
        Command::Speak { text } => {
            guide.speak(&text.join(" ")).await?.wait().await?;
        }
        Command::Chat => chat_loop(guide).await?,
        Command::Setup | Command::ShowConfig => {}
    }
    Ok(())
}

/// Read questions from stdin until EOF or `/quit`
async fn chat_loop(guide: &TourGuide) -> anyhow::Result<()> {
    println!("Ask your tour guide anything. Commands: /photo <path>, /listen <path>, /stop, /clear, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/clear", _) => {
                guide.clear_conversation().await;
                println!("(conversation cleared)");
                continue;
            }
            ("/stop", _) => {
                guide.stop_speaking().await;
                continue;
            }
            ("/listen", path) => match guide.transcribe(Path::new(path.trim())).await {
                // Recognized text is shown for review, not sent
                Ok(text) => {
                    println!("> {text}");
                    continue;
                }
                Err(e) => Err(e),
            },
            ("/photo", path) => guide.describe_photo(Path::new(path.trim())).await,
            _ => guide.ask(line).await,
        };

        match result {
            Ok(reply) => println!("\n{}\n", reply.text),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    guide.stop_speaking().await;
    Ok(())
}

/// Provider from the environment, else from the settings store
fn provider_config(store: &SettingsStore) -> anyhow::Result<ProviderConfig> {
    if let Some(config) = Config::provider_from_env()? {
        return Ok(config);
    }
    store
        .provider_config()?
        .context("no LLM provider configured; run `tour-guide setup` or set TOUR_GUIDE_PROVIDER and TOUR_GUIDE_API_KEY")
}

fn show_config(config: &Config, store: &SettingsStore) -> anyhow::Result<()> {
    println!("Data dir:   {}", config.data_dir.display());
    println!("Cache dir:  {}", config.cache_dir.display());
    println!("Player:     {}", config.player_command);
    println!();

    match provider_config(store) {
        Ok(provider) => {
            println!("Provider:   {}", provider.provider);
            println!("API key:    {}", provider.api_key.masked());
            println!("Base URL:   {}", provider.resolved_base_url());
            println!("Model:      {}", provider.resolved_model());
        }
        Err(e) => println!("Provider:   (not configured: {e})"),
    }
    println!();

    let voice = store.voice_config()?;
    let configured = voice.is_some();
    let voice = voice.unwrap_or_default();
    println!(
        "Voice:      {} ({}{})",
        if voice.enabled { "on" } else { "off" },
        voice.provider,
        if configured { "" } else { ", defaults" }
    );
    println!("Language:   {}", voice.language);
    println!("Voice id:   {}", voice.voice);
    println!("Rate:       {}", voice.effective_rate());
    println!("Pitch:      {}", voice.effective_pitch());
    if let Some(tencent) = &voice.tencent {
        println!("Tencent:    {}", tencent.secret_id.masked());
    }
    if let Some(baidu) = &voice.baidu {
        println!("Baidu:      {}", baidu.api_key.masked());
    }

    Ok(())
}
