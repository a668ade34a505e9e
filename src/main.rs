//! devreg entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};
use serde_json::{Map, Value};

mod actor;
mod config;
mod dispatch;
mod error;
mod registry;
mod store;
mod types;

use actor::RegistryHandle;
use config::Config;
use dispatch::Dispatcher;
use registry::DeviceRegistry;
use store::JsonFileStore;
use types::Command;

#[derive(Debug, Parser)]
#[command(name = "devreg", about = "Operator console for the device registry")]
struct Cli {
    /// Operator id; must be on the allow-list.
    #[arg(short, long)]
    user: i64,

    /// Override the configured device store path.
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Create the device store if it does not exist yet.
    Init,
    /// Show the number of registered devices.
    Start,
    /// Show every device in detail.
    View,
    /// One line per device, for picking an id.
    List,
    /// Register a device.
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        ip: String,
        /// Extra field to store with the record, as KEY=VALUE.  VALUE is
        /// parsed as JSON when possible.
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },
    /// Delete a device by id.
    Remove { id: String },
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", raw))?;
    if key.is_empty() {
        return Err("field name must not be empty".into());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Every action, `init` included, requires an allow-listed operator.
fn check_operator(authorized_users: &[i64], user: i64) -> anyhow::Result<()> {
    if authorized_users.is_empty() {
        error!("No authorized users configured (set DEVREG_AUTHORIZED_USERS)");
        anyhow::bail!("refusing to start without an operator allow-list");
    }
    if !dispatch::is_authorized(authorized_users, user) {
        error!("Rejected unauthorized user {}", user);
        anyhow::bail!(dispatch::UNAUTHORIZED);
    }
    Ok(())
}

impl Action {
    fn into_command(self) -> Option<Command> {
        match self {
            Action::Init => None,
            Action::Start => Some(Command::Start),
            Action::View => Some(Command::ViewDevices),
            Action::List => Some(Command::ListIds),
            Action::Add {
                id,
                name,
                ip,
                fields,
            } => Some(Command::AddDevice {
                id,
                name,
                ip,
                extra: fields.into_iter().collect::<Map<String, Value>>(),
            }),
            Action::Remove { id } => Some(Command::RemoveDevice { id }),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    // Load configuration
    let mut cfg = Config::load()?;
    if let Some(db) = cli.db {
        cfg.db_path = db;
    }
    info!("Starting devreg with config: {:?}", cfg);

    check_operator(&cfg.authorized_users, cli.user)?;

    let store = JsonFileStore::new(&cfg.db_path);
    let location = store.path().display().to_string();
    let registry = DeviceRegistry::new(store);
    registry.ensure_initialized().await?;

    let Some(command) = cli.action.into_command() else {
        println!("Device store ready at {}", location);
        return Ok(ExitCode::SUCCESS);
    };

    let (handle, registry_task) = RegistryHandle::spawn(registry, cfg.queue_depth);
    let dispatcher = Dispatcher::new(handle, cfg.authorized_users);
    let outcome = dispatcher.dispatch(cli.user, command).await;

    // Dropping the last handle lets the owner task drain and exit.
    drop(dispatcher);
    if let Err(e) = registry_task.await {
        error!("Registry task failed: {}", e);
    }

    if outcome.success {
        println!("{}", outcome.message);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{}", outcome.message);
        Ok(ExitCode::FAILURE)
    }
}
