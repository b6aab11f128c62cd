//! Agora CLI — the main entry point.
//!
//! Commands:
//! - `serve`   — Start the HTTP gateway
//! - `prompt`  — Print the system prompt for a figure/mode/topic
//! - `doctor`  — Diagnose configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agora",
    about = "Agora — converse with historical figures",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the resolved system prompt without calling the model
    Prompt {
        /// Figure name, e.g. "Marcus Aurelius"
        #[arg(short, long)]
        figure: String,

        /// Conversation mode: socratic, teaching, debate, interview, scenario
        #[arg(short, long)]
        mode: String,

        #[arg(short, long)]
        topic: Option<String>,
    },

    /// Diagnose configuration and credentials
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Prompt {
            figure,
            mode,
            topic,
        } => commands::prompt::run(&figure, &mode, topic.as_deref())?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn prompt_args_parse() {
        let cli = Cli::parse_from([
            "agora",
            "prompt",
            "--figure",
            "Marcus Aurelius",
            "--mode",
            "teaching",
            "--topic",
            "discipline",
        ]);
        match cli.command {
            Commands::Prompt {
                figure,
                mode,
                topic,
            } => {
                assert_eq!(figure, "Marcus Aurelius");
                assert_eq!(mode, "teaching");
                assert_eq!(topic.as_deref(), Some("discipline"));
            }
            _ => panic!("expected prompt command"),
        }
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["agora", "serve", "--port", "8080", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { port: Some(8080) }));
    }
}
