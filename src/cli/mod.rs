//! CLI interface for Chime

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Procedural UI sound effects synthesized on the fly
#[derive(Parser)]
#[command(name = "chime")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the sounds in the catalog
    List {
        /// Only show one category (ui_feedback, educational, ambient, notification)
        #[arg(long)]
        category: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Play a sound through the output device
    Play {
        /// Sound id, e.g. ui_click
        id: String,

        /// Volume scale 0.0-1.0
        #[arg(short, long, default_value = "1.0")]
        volume: f32,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Cycle through every enabled sound until interrupted
    Demo {
        /// Pause between sounds in milliseconds
        #[arg(short, long, default_value = "1200")]
        interval: u64,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Render a sound to a WAV file
    Record {
        /// Sound id, e.g. ui_click
        id: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Volume scale 0.0-1.0
        #[arg(short, long, default_value = "1.0")]
        volume: f32,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List available audio output devices
    Devices,

    /// Validate a configuration file and its catalog
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "chime.yaml")]
        config: PathBuf,
    },

    /// Print the built-in catalog as YAML
    Export,

    /// Generate an example configuration file
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play() {
        let cli = Cli::try_parse_from(["chime", "play", "ui_click", "--volume", "0.5"]).unwrap();
        match cli.command {
            Commands::Play { id, volume, config } => {
                assert_eq!(id, "ui_click");
                assert_eq!(volume, 0.5);
                assert!(config.is_none());
            }
            _ => panic!("expected play"),
        }
    }

    #[test]
    fn test_record_requires_output() {
        assert!(Cli::try_parse_from(["chime", "record", "ui_click"]).is_err());
    }

    #[test]
    fn test_check_default_config() {
        let cli = Cli::try_parse_from(["chime", "check"]).unwrap();
        match cli.command {
            Commands::Check { config } => assert_eq!(config, PathBuf::from("chime.yaml")),
            _ => panic!("expected check"),
        }
    }
}
