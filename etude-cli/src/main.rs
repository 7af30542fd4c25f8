//! etude - practice capture and scoring from the terminal
//!
//! Subcommands:
//! - `etude devices` - list MIDI inputs
//! - `etude practice` - capture a live performance and send it for scoring
//! - `etude score <file>` - score a recorded note list offline
//! - `etude name <pitch>` - print a note name

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod config;
mod practice;

#[derive(Parser)]
#[command(name = "etude")]
#[command(about = "Real-time MIDI practice capture and scoring")]
#[command(version)]
struct Cli {
    /// Directory holding settings.json and the persisted session keys
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Notation {
    Letter,
    Solfege,
}

#[derive(Subcommand)]
enum Commands {
    /// List MIDI input ports
    Devices,

    /// Capture from every MIDI input (or the selected one) and practice interactively
    Practice {
        /// Data service base URL
        #[arg(long, env = "ETUDE_DATA_SERVICE_URL")]
        data_url: Option<String>,

        /// Assistant service base URL
        #[arg(long, env = "ETUDE_ASSISTANT_SERVICE_URL")]
        assistant_url: Option<String>,

        /// User the session belongs to
        #[arg(short, long)]
        user: Option<String>,

        /// Reference score to practice against
        #[arg(short, long)]
        reference: Option<String>,

        /// Section to start in (intro, verse, chorus, bridge, outro)
        #[arg(short, long)]
        section: Option<String>,

        /// Capture locally without contacting any service
        #[arg(long)]
        offline: bool,
    },

    /// Score a JSON list of notes ({note, velocity, time}) without any service
    Score {
        /// Performed notes
        performed: PathBuf,

        /// Reference notes for the same section
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },

    /// Print the display name of a MIDI pitch
    Name {
        pitch: u8,

        #[arg(short, long, value_enum, default_value = "letter")]
        notation: Notation,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let dirs = config::Dirs::resolve(cli.config_dir)?;

    match cli.command {
        Commands::Devices => commands::devices()?,
        Commands::Practice {
            data_url,
            assistant_url,
            user,
            reference,
            section,
            offline,
        } => {
            let overrides = config::Overrides {
                data_url,
                assistant_url,
                user,
                reference,
                section,
                offline,
            };
            practice::run(&dirs, overrides).await?;
        }
        Commands::Score {
            performed,
            reference,
        } => commands::score_file(&performed, reference.as_deref())?,
        Commands::Name { pitch, notation } => commands::name(pitch, notation)?,
    }

    Ok(())
}
