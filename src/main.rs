use anyhow::Result;
use bergvox::cli::{Cli, Commands};
use bergvox::config::Config;
use bergvox::pipeline::{Pipeline, PipelineConfig};
use bergvox::stt::{WhisperConfig, WhisperTranscriber};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.quiet);

    match cli.command {
        Some(Commands::Extract { ref text }) => {
            match bergvox::extract_berg_score(text) {
                Some(score) => println!("{}", score),
                None => {
                    eprintln!("no Berg-scale score found");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        None => run_bot(&cli).await,
    }
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_bot(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;

    // Refuse to start without the bot token; a bot that silently cannot
    // talk to its transport helps no one.
    let token = match config.token() {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "startup aborted");
            return Err(e.into());
        }
    };

    let timeout = config.timeout()?;

    info!(
        version = %bergvox::version_string(),
        model = %config.stt.model,
        language = %config.stt.language,
        backend = bergvox::defaults::gpu_backend(),
        "loading model"
    );

    let transcriber = Arc::new(WhisperTranscriber::new(WhisperConfig {
        model_path: PathBuf::from(&config.stt.model),
        language: config.stt.language.clone(),
        threads: None,
    })?);

    let pipeline = Arc::new(Pipeline::new(
        transcriber,
        PipelineConfig {
            timeout,
            max_concurrent_transcriptions: config.pipeline.max_concurrent_transcriptions,
            scratch_root: None,
        },
    ));

    info!("model loaded, starting transport");

    serve_transport(token, pipeline).await
}

#[cfg(feature = "telegram")]
async fn serve_transport(token: String, pipeline: Arc<Pipeline>) -> Result<()> {
    let transport = bergvox::transport::telegram::TelegramTransport::new(token)?;

    tokio::select! {
        result = bergvox::service::serve(transport, pipeline) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT, shutting down");
        }
    }
    Ok(())
}

#[cfg(not(feature = "telegram"))]
async fn serve_transport(_token: String, _pipeline: Arc<Pipeline>) -> Result<()> {
    anyhow::bail!("built without the 'telegram' feature; no transport available")
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match cli.config.as_deref() {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(cli.apply_to(config.with_env_overrides()))
}
