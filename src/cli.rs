//! Command-line interface for bergvox
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Berg-scale score extraction bot
#[derive(Parser, Debug)]
#[command(
    name = "bergvox",
    version,
    about = "Extracts Berg Balance Scale scores from voice messages"
)]
pub struct Cli {
    /// Subcommand to execute (default: run the bot)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Whisper model file path (default: models/ggml-base.bin)
    #[arg(long, value_name = "PATH")]
    pub model: Option<String>,

    /// Language code for transcription (default: ru)
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Per-invocation timeout. Examples: 60s, 2m, 1m30s
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the score extractor over a text snippet, without audio
    Extract {
        /// Transcript text to scan for a Berg-scale score
        text: String,
    },
}

impl Cli {
    /// Fold CLI flags into a loaded configuration. Flags beat the file and
    /// the environment.
    pub fn apply_to(&self, mut config: crate::config::Config) -> crate::config::Config {
        if let Some(model) = &self.model {
            config.stt.model = model.clone();
        }
        if let Some(language) = &self.language {
            config.stt.language = language.clone();
        }
        if let Some(timeout) = &self.timeout {
            config.pipeline.timeout = timeout.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn parses_bare_invocation() {
        let cli = Cli::parse_from(["bergvox"]);
        assert!(cli.command.is_none());
        assert!(!cli.quiet);
        assert!(cli.model.is_none());
    }

    #[test]
    fn parses_extract_subcommand() {
        let cli = Cli::parse_from(["bergvox", "extract", "берг 42"]);
        match cli.command {
            Some(Commands::Extract { text }) => assert_eq!(text, "берг 42"),
            other => panic!("expected extract, got {:?}", other),
        }
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "bergvox",
            "--model",
            "models/ggml-small.bin",
            "--language",
            "uk",
            "--timeout",
            "90s",
        ]);
        let config = cli.apply_to(Config::default());
        assert_eq!(config.stt.model, "models/ggml-small.bin");
        assert_eq!(config.stt.language, "uk");
        assert_eq!(config.pipeline.timeout, "90s");
    }

    #[test]
    fn absent_flags_leave_config_untouched() {
        let cli = Cli::parse_from(["bergvox"]);
        let config = cli.apply_to(Config::default());
        assert_eq!(config, Config::default());
    }
}
