//! AppRole role reconciliation CLI
//!
//! Creates, refreshes, updates, deletes and imports AppRole roles in Vault,
//! keeping the last-synced view of each role in a local state directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use ar_config::{load_role_file, AppConfig, ConfigLoader};
use ar_core::path;
use ar_core::{ReadOutcome, RemoteApi, ResourceState, RoleConfig, RoleController, StateStore};
use ar_vault::VaultClient;

/// AppRole role management
#[derive(Parser, Debug)]
#[command(name = "ar-ctl")]
#[command(about = "Reconcile Vault AppRole roles with local role documents")]
struct Cli {
    /// Configuration file (otherwise APPROLE_CONFIG or the standard paths)
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a role from a TOML role document
    Create {
        #[arg(long)]
        file: PathBuf,
    },
    /// Refresh a role from Vault and print it
    Read(Target),
    /// Push the differences between a role document and the stored state
    Update {
        #[arg(long)]
        file: PathBuf,
    },
    /// Create the role if it has no stored state, update it otherwise
    Apply {
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a role
    Delete(Target),
    /// Print whether a role exists
    Exists(Target),
    /// Start managing an existing role, given its path
    Import {
        /// e.g. auth/approle/role/my-role
        path: String,
    },
    /// Print the stored state of every managed role
    List,
    /// Print an example configuration file
    ExampleConfig,
}

/// A role named either by mount and name, or by its full path
#[derive(Args, Debug)]
struct Target {
    /// Auth mount (defaults to the configured default mount)
    #[arg(long, conflicts_with = "id")]
    mount: Option<String>,

    #[arg(long, conflicts_with = "id", required_unless_present = "id")]
    role_name: Option<String>,

    /// Full role path, e.g. auth/approle/role/my-role
    #[arg(long)]
    id: Option<String>,
}

impl Target {
    fn path(&self, default_mount: &str) -> String {
        match (&self.id, &self.role_name) {
            (Some(id), _) => id.clone(),
            (None, role_name) => path::encode(
                self.mount.as_deref().unwrap_or(default_mount),
                role_name.as_deref().unwrap_or_default(),
            ),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    ar_common::logging::init_logging("ar-ctl");

    let cli = Cli::parse();

    if let Command::ExampleConfig = cli.command {
        print!("{}", AppConfig::example_toml());
        return Ok(());
    }

    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load().context("Failed to load configuration")?;

    let remote: Arc<dyn RemoteApi> = Arc::new(
        VaultClient::new(
            &config.vault.addr,
            config.vault.token.clone(),
            config.vault.namespace.clone(),
            config.vault.timeout(),
        )
        .context("Failed to create Vault client")?,
    );
    let store = StateStore::new(&config.state.dir);
    let default_mount = config.defaults.mount.as_str();

    match cli.command {
        Command::Create { file } => {
            let role = load_role_file(&file, default_mount)
                .with_context(|| format!("Failed to load role document {}", file.display()))?;
            create(remote, &store, role).await
        }
        Command::Read(target) => {
            let id = target.path(default_mount);
            let mut controller = controller_for(remote, &store, &id).await?;
            let outcome = controller.read().await;
            sync_state(&store, &id, &controller).await?;

            match outcome.with_context(|| format!("Failed to read {}", id))? {
                ReadOutcome::Synced(_) => print_state(&controller),
                ReadOutcome::Removed => {
                    eprintln!("{} no longer exists; removed from state", id);
                    Ok(())
                }
            }
        }
        Command::Update { file } => {
            let role = load_role_file(&file, default_mount)
                .with_context(|| format!("Failed to load role document {}", file.display()))?;
            let id = role.path();
            let Some(stored) = store.load(&id).await? else {
                bail!("{} has no stored state; create or import it first", id);
            };
            update(remote, &store, stored, role).await
        }
        Command::Apply { file } => {
            let role = load_role_file(&file, default_mount)
                .with_context(|| format!("Failed to load role document {}", file.display()))?;
            match store.load(&role.path()).await? {
                Some(stored) => update(remote, &store, stored, role).await,
                None => create(remote, &store, role).await,
            }
        }
        Command::Delete(target) => {
            let id = target.path(default_mount);
            let mut controller = controller_for(remote, &store, &id).await?;
            let result = controller.delete().await;
            sync_state(&store, &id, &controller).await?;
            result.with_context(|| format!("Failed to delete {}", id))?;

            info!(path = %id, "Role deleted");
            println!("deleted {}", id);
            Ok(())
        }
        Command::Exists(target) => {
            let id = target.path(default_mount);
            let controller = controller_for(remote, &store, &id).await?;
            let exists = controller
                .exists()
                .await
                .with_context(|| format!("Failed to check {}", id))?;
            println!("{}", exists);
            Ok(())
        }
        Command::Import { path } => {
            let mut controller = RoleController::new(remote);
            let result = controller.import(&path).await;
            sync_state(&store, &path, &controller).await?;
            result.with_context(|| format!("Failed to import {}", path))?;
            print_state(&controller)
        }
        Command::List => {
            for state in store.list().await? {
                println!("{}", serde_json::to_string_pretty(&state)?);
            }
            Ok(())
        }
        Command::ExampleConfig => Ok(()),
    }
}

async fn create(remote: Arc<dyn RemoteApi>, store: &StateStore, role: RoleConfig) -> Result<()> {
    let id = role.path();
    let mut controller = RoleController::new(remote);
    let result = controller.create(role).await;
    // A failed RoleID write still leaves a role behind
    sync_state(store, &id, &controller).await?;
    result.with_context(|| format!("Failed to create {}", id))?;
    print_state(&controller)
}

async fn update(
    remote: Arc<dyn RemoteApi>,
    store: &StateStore,
    stored: ResourceState,
    desired: RoleConfig,
) -> Result<()> {
    let id = stored.id.clone();
    let mut controller = RoleController::adopt(remote, stored.id, stored.config);
    let result = controller.update_to(desired).await;
    sync_state(store, &id, &controller).await?;
    result.with_context(|| format!("Failed to update {}", id))?;
    print_state(&controller)
}

/// A controller for `id`, resumed from stored state when there is some
async fn controller_for(
    remote: Arc<dyn RemoteApi>,
    store: &StateStore,
    id: &str,
) -> Result<RoleController> {
    let config = match store.load(id).await? {
        Some(stored) => stored.config,
        None => path::decode(id)
            .map(|identity| RoleConfig::new(identity.mount, identity.role_name))
            .unwrap_or_default(),
    };
    Ok(RoleController::adopt(remote, id, config))
}

/// Mirror the controller's view of `id` into the store
async fn sync_state(store: &StateStore, id: &str, controller: &RoleController) -> Result<()> {
    match controller.id() {
        Some(current) => {
            store
                .save(&ResourceState {
                    id: current.to_string(),
                    config: controller.state().clone(),
                })
                .await
                .context("Failed to save role state")?;
        }
        None => store.remove(id).await.context("Failed to remove role state")?,
    }
    Ok(())
}

fn print_state(controller: &RoleController) -> Result<()> {
    let state = ResourceState {
        id: controller.id().unwrap_or_default().to_string(),
        config: controller.state().clone(),
    };
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
