mod app;
mod login_cmd;
mod portals_cmd;
mod send_cmd;
mod status_cmd;
mod terminal_output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use portalchat_config::{write_config, PortalChatConfig};

use app::App;
use terminal_output::{note_error, note_info, note_success};

#[derive(Parser)]
#[command(name = "portalchat")]
#[command(about = "Chat with Portal backend prompt portals from the terminal")]
#[command(version)]
struct Cli {
    /// Config file (defaults to config.yaml in $PORTALCHAT_CONFIG_DIR or ~/.portalchat)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file if none exists
    Init,
    /// Log in and discover the portals this account can use
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "PORTALCHAT_PASSWORD", hide_env_values = true)]
        password: String,
        /// Overrides backend.baseUrl
        #[arg(long)]
        base_url: Option<String>,
    },
    /// Clear the stored session
    Logout,
    /// Published portals and saved portal configs
    Portals {
        #[command(subcommand)]
        action: Option<PortalsAction>,
    },
    /// Send a prompt to a portal
    Send {
        message: String,
        /// Portal id; uses its saved parameters when present
        #[arg(long)]
        portal: Option<String>,
        /// File to attach
        #[arg(long)]
        file: Option<PathBuf>,
        /// Password for silent re-login if the session has expired
        #[arg(long, env = "PORTALCHAT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Show session and portal availability
    Status,
}

#[derive(Subcommand)]
enum PortalsAction {
    /// List published portals (default)
    List {
        /// Store each listed portal as a saved config
        #[arg(long)]
        save: bool,
    },
    /// Show saved portal configs
    Saved,
    /// Create or update a saved portal config
    Set {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// KEY=VALUE, repeatable
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// Delete a saved portal config
    Remove { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            note_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app = App::bootstrap(cli.config).await?;
    match cli.command {
        Commands::Init => init(&app.config_path).await,
        Commands::Login {
            username,
            password,
            base_url,
        } => login_cmd::login(&app, username, password, base_url).await,
        Commands::Logout => login_cmd::logout(&app).await,
        Commands::Portals { action } => match action.unwrap_or(PortalsAction::List { save: false }) {
            PortalsAction::List { save } => portals_cmd::list(&app, save).await,
            PortalsAction::Saved => portals_cmd::saved(&app).await,
            PortalsAction::Set { id, name, params } => {
                portals_cmd::set(&app, id, name, params).await
            }
            PortalsAction::Remove { id } => portals_cmd::remove(&app, id).await,
        },
        Commands::Send {
            message,
            portal,
            file,
            password,
        } => {
            send_cmd::run(
                &app,
                send_cmd::SendArgs {
                    message,
                    portal,
                    file,
                    password,
                },
            )
            .await
        }
        Commands::Status => status_cmd::run(&app).await,
    }
}

async fn init(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        note_info(&format!("Config already exists at {}", path.display()));
        return Ok(());
    }
    write_config(&PortalChatConfig::default(), path).await?;
    note_success(&format!("Wrote {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn portals_defaults_to_list() {
        let cli = Cli::try_parse_from(["portalchat", "portals"]).unwrap();
        assert!(matches!(cli.command, Commands::Portals { action: None }));
    }

    #[test]
    fn send_collects_options() {
        let cli = Cli::try_parse_from([
            "portalchat", "send", "hello", "--portal", "7", "--file", "a.pdf",
        ])
        .unwrap();
        match cli.command {
            Commands::Send {
                message,
                portal,
                file,
                ..
            } => {
                assert_eq!(message, "hello");
                assert_eq!(portal.as_deref(), Some("7"));
                assert_eq!(file, Some(PathBuf::from("a.pdf")));
            }
            _ => panic!("expected send"),
        }
    }

    #[tokio::test]
    async fn init_writes_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        init(&path).await.unwrap();
        let first = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(first.contains("backend"));

        init(&path).await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), first);
    }
}
