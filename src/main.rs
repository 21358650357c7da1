use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use decg::config::{self, WorkspaceConfig};
use decg::render;
use decg::vcs::GitCli;
use decg::workspace::{Fallback, InitRequest, Workspace, WorkspaceLock};

#[derive(Parser)]
#[command(name = "decg")]
#[command(about = "Sparse-checkout workspace initializer for multi-submodule hubs")]
struct Cli {
    /// Hub root (defaults to the nearest ancestor with a .gitmodules)
    #[arg(long, global = true, env = "DECG_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the workspace for a service version
    Init {
        service: String,
        version: String,

        /// Profile document to use instead of the conventional lookup
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Extra include pattern, `<path>` or `<submodule>:<path>`
        #[arg(short, long = "include")]
        include: Vec<String>,

        /// Extra exclude pattern, `<path>` or `<submodule>:<path>`
        #[arg(short, long = "exclude")]
        exclude: Vec<String>,

        /// Print the planned state diff without touching anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage service versions
    Version {
        #[command(subcommand)]
        command: VersionCommands,
    },
    /// Show what the workspace state records for every submodule
    Status,
    /// Manage the hub configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum VersionCommands {
    /// Move the workspace to a new version
    New {
        service: String,
        version: String,

        #[arg(short, long)]
        profile: Option<PathBuf>,

        #[arg(long)]
        dry_run: bool,
    },
    /// Print the active service and version
    Current,
    /// List versions of a service that have a profile
    List { service: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to the hub config file
    Init,
}

/// Logs go to stderr so stdout carries only reports.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "decg=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn hub_root(explicit: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(root) => Ok(root),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            Ok(config::find_hub_root(&cwd)?)
        }
    }
}

fn open_workspace(root: &Path) -> anyhow::Result<Workspace> {
    let config = WorkspaceConfig::load(root)?;
    let vcs = Arc::new(GitCli::new(root, config.fetch_timeout()));
    Ok(Workspace::open(root, config, vcs)?)
}

async fn run(
    root: &Path,
    request: InitRequest,
    fallback: Fallback,
    dry_run: bool,
) -> anyhow::Result<()> {
    let workspace = open_workspace(root)?;

    if dry_run {
        let changes = workspace.preview(&request, fallback)?;
        print!("{}", render::render_changes(&changes));
        return Ok(());
    }

    let _lock = WorkspaceLock::acquire(root)?;
    let report = match fallback {
        Fallback::AllKnown => workspace.init(&request).await?,
        Fallback::PreviouslyActive => workspace.version_new(&request).await?,
    };
    print!("{}", render::render_report(&report));

    if !report.is_success() {
        bail!(
            "{} submodule(s) failed; workspace state was not updated",
            report.failures().count()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let root = hub_root(cli.root)?;

    match cli.command {
        Commands::Init {
            service,
            version,
            profile,
            include,
            exclude,
            dry_run,
        } => {
            let request = InitRequest {
                profile,
                include,
                exclude,
                ..InitRequest::new(service, version)
            };
            run(&root, request, Fallback::AllKnown, dry_run).await?;
        }
        Commands::Version { command } => match command {
            VersionCommands::New {
                service,
                version,
                profile,
                dry_run,
            } => {
                let request = InitRequest {
                    profile,
                    ..InitRequest::new(service, version)
                };
                run(&root, request, Fallback::PreviouslyActive, dry_run).await?;
            }
            VersionCommands::Current => {
                let workspace = open_workspace(&root)?;
                match workspace.load_state()? {
                    Some(state) => println!("{} {}", state.active_service, state.active_version),
                    None => println!("(not initialized)"),
                }
            }
            VersionCommands::List { service } => {
                let workspace = open_workspace(&root)?;
                let active = workspace
                    .load_state()?
                    .filter(|state| state.active_service == service)
                    .map(|state| state.active_version);
                let versions = workspace.list_versions(&service)?;
                if versions.is_empty() {
                    println!("No profiles found for {service}");
                }
                for version in versions {
                    let marker = if active.as_deref() == Some(version.as_str()) {
                        '*'
                    } else {
                        ' '
                    };
                    println!("{marker} {version}");
                }
            }
        },
        Commands::Status => {
            let workspace = open_workspace(&root)?;
            let state = workspace.load_state()?;
            print!(
                "{}",
                render::render_status(workspace.submodules(), state.as_ref())
            );
            let journal = workspace.state_store().load_journal()?;
            if !journal.is_empty() {
                let pending: Vec<&str> = journal.trees.keys().map(String::as_str).collect();
                println!(
                    "\nLast run was withheld; the next run reconciles: {}",
                    pending.join(", ")
                );
            }
        }
        Commands::Config { command } => {
            let config = WorkspaceConfig::load(&root)?;
            match command {
                ConfigCommands::Show => {
                    let content = serde_json::to_string_pretty(&config)
                        .context("Failed to serialize config")?;
                    println!("{content}");
                }
                ConfigCommands::Init => {
                    config.save(&root)?;
                    println!("Wrote {}", config::hub_config_path(&root).display());
                }
            }
        }
    }

    Ok(())
}
