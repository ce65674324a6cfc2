// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fleetvault - encrypted SSH credential vault and fleet updater.
//!
//! This is the binary entry point.

mod context;
mod fleet;
mod manage;
mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use fleetvault_core::{FleetError, Operation};
use fleetvault_dispatch::{SshConnector, install_signal_handler};
use fleetvault_vault::{DerivedKey, SaltAccess};

use crate::context::{App, KeySource};
use crate::manage::EditRequest;
use crate::prompt::TerminalPrompter;

/// Fleetvault - update Linux systems and manage their SSH connections.
#[derive(Parser, Debug)]
#[command(name = "fleetvault", version, about, long_about = None)]
struct Cli {
    /// Vault passphrase (otherwise FLEETVAULT_PASSPHRASE or a prompt).
    #[arg(short, long, global = true)]
    key: Option<String>,

    /// Base64 vault key, used instead of deriving one from a passphrase.
    #[arg(long, global = true, conflicts_with = "key")]
    derived_key: Option<String>,

    /// Read configuration from this file instead of the usual locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands. Without one, `update` runs.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Add one or more new connections.
    Add,
    /// List connections.
    List,
    /// Edit a connection.
    Edit {
        /// Host (IP or hostname) of the connection to change.
        #[arg(long)]
        host: Option<String>,
        /// Field to change (user, host, port, password, passwordless_sudo, package_manager).
        #[arg(long)]
        field: Option<String>,
        /// New value.
        #[arg(long)]
        value: Option<String>,
    },
    /// Remove a connection by host.
    Remove {
        #[arg(long)]
        host: Option<String>,
    },
    /// Import connections from a JSON descriptor.
    Import {
        /// Descriptor path (defaults to import.descriptor_path).
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show the last N lines of the audit log.
    Log {
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
    /// Check connectivity and sudo on every host.
    Test,
    /// Upgrade every host with its package manager.
    Update,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Add => "add",
            Commands::List => "list",
            Commands::Edit { .. } => "edit",
            Commands::Remove { .. } => "remove",
            Commands::Import { .. } => "import",
            Commands::Log { .. } => "log",
            Commands::Test => "test",
            Commands::Update => "update",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match fleetvault_config::load_and_validate(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            fleetvault_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging.level);

    let app = App::new(config);
    let command = cli.command.unwrap_or(Commands::Update);
    let keys = KeySource {
        passphrase: cli.key,
        derived: cli.derived_key,
    };

    let name = command.name();
    match run(&app, command, keys).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(command = name, error = %e, "command failed");
            app.audit
                .record_or_warn(&format!("Error running {name}, {e}"));
            eprintln!("{}: {e}", "error".red());
            std::process::exit(1);
        }
    }
}

/// Execute one command. `Ok(false)` means some host failed.
async fn run(app: &App, command: Commands, keys: KeySource) -> Result<bool, FleetError> {
    let name = command.name();
    match command {
        Commands::Log { lines } => {
            manage::show_log(app, lines.unwrap_or(app.config.audit.tail_lines))?;
        }
        Commands::Add => {
            let key = unlock(app, name, keys, SaltAccess::Write)?;
            let mut ask = TerminalPrompter::new()?;
            manage::add(app, &key, &mut ask)?;
        }
        Commands::List => manage::list(app, &unlock(app, name, keys, SaltAccess::Read)?)?,
        Commands::Edit { host, field, value } => {
            let key = unlock(app, name, keys, SaltAccess::Read)?;
            let mut ask = TerminalPrompter::new()?;
            manage::edit(app, &key, EditRequest { host, field, value }, &mut ask)?;
        }
        Commands::Remove { host } => {
            let key = unlock(app, name, keys, SaltAccess::Read)?;
            let mut ask = TerminalPrompter::new()?;
            manage::remove(app, &key, host, &mut ask)?;
        }
        Commands::Import { file } => {
            let key = unlock(app, name, keys, SaltAccess::Write)?;
            let path =
                file.unwrap_or_else(|| PathBuf::from(&app.config.import.descriptor_path));
            manage::import(app, &key, &path)?;
        }
        Commands::Test => return dispatch(app, keys, Operation::Test).await,
        Commands::Update => return dispatch(app, keys, Operation::Update).await,
    }
    Ok(true)
}

/// Record the command start and resolve the vault key.
fn unlock(
    app: &App,
    name: &str,
    keys: KeySource,
    access: SaltAccess,
) -> Result<DerivedKey, FleetError> {
    app.audit.record_or_warn(&format!(
        "Starting {name} on vault {}",
        app.store.path().display()
    ));
    app.key(keys, access)
}

async fn dispatch(app: &App, keys: KeySource, operation: Operation) -> Result<bool, FleetError> {
    let key = unlock(app, &operation.to_string(), keys, SaltAccess::Read)?;
    let cancel = install_signal_handler();
    let report = fleet::run(app, &key, operation, Arc::new(SshConnector::new()), cancel).await?;
    fleet::print_report(&report);
    Ok(report.all_succeeded())
}

/// Initialize the tracing subscriber with the configured log level.
///
/// `RUST_LOG` takes precedence when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fleetvault={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
