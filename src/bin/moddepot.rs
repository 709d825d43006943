//! ModDepot CLI - manage BepInEx plugin packages from the terminal.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, MultiSelect, Select};
use tracing_subscriber::EnvFilter;

use moddepot_core::catalog;
use moddepot_core::confirm::FixedChoice;
use moddepot_core::host::{FileSystemCheck, RuntimeCheck, RuntimeStatus};
use moddepot_core::operations::{self, InstallOutcome, UninstallOutcome};
use moddepot_core::registry::scan_installed;
use moddepot_core::store;
use moddepot_core::{Choice, Confirmer, ManagerConfig, Prompt, VersionSelection};

#[derive(Parser)]
#[command(name = "moddepot")]
#[command(about = "Install and manage BepInEx plugin packages", long_about = None)]
struct Args {
    /// Game install folder (the one containing BepInEx/)
    #[arg(long, env = "MODDEPOT_GAME_ROOT", global = true)]
    game_root: Option<PathBuf>,

    /// Answer every question with the default action
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List installed packages
    List,
    /// Install a module file, folder or archive
    Install { source: PathBuf },
    /// Enable a package
    Enable { id: String },
    /// Disable a package
    Disable { id: String },
    /// Make a stored version the active one
    Switch { id: String, version: String },
    /// Show stored versions of a package
    Versions { id: String },
    /// Uninstall a package or prune its stored versions
    Uninstall { id: String },
    /// Rebuild the package catalog from the plugin directory
    RebuildIndex,
    /// Check that the plugin host runtime is set up
    Status,
}

/// Terminal prompts.
struct TerminalConfirmer {
    theme: ColorfulTheme,
}

impl Confirmer for TerminalConfirmer {
    fn ask_choice(&mut self, prompt: &Prompt<'_>) -> Choice {
        let options = prompt.options();
        let labels: Vec<&str> = options.iter().map(|(_, label)| *label).collect();
        println!("{}", prompt.message());

        match Select::with_theme(&self.theme)
            .with_prompt(prompt.title())
            .items(&labels)
            .default(0)
            .interact_opt()
        {
            Ok(Some(index)) => options[index].0,
            Ok(None) => Choice::Cancel,
            Err(e) => {
                tracing::warn!(error = %e, "prompt failed, canceling");
                Choice::Cancel
            }
        }
    }

    fn pick_versions(
        &mut self,
        display_name: &str,
        active_version: &str,
        stored: &[String],
    ) -> Option<VersionSelection> {
        let remove = MultiSelect::with_theme(&self.theme)
            .with_prompt(format!("{display_name}: stored versions to remove"))
            .items(stored)
            .interact_opt()
            .ok()??;

        let mut keep_items = vec![format!("keep {active_version} active")];
        keep_items.extend(stored.iter().map(|v| format!("switch to {v}")));
        let keep = Select::with_theme(&self.theme)
            .with_prompt("Active version")
            .items(&keep_items)
            .default(0)
            .interact_opt()
            .ok()??;

        Some(VersionSelection {
            remove: remove.into_iter().map(|i| stored[i].clone()).collect(),
            keep_as_active: keep.checked_sub(1).map(|i| stored[i].clone()),
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("moddepot_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ManagerConfig::new(args.game_root.unwrap_or_default());

    let mut confirmer: Box<dyn Confirmer> = if args.yes {
        Box::new(FixedChoice(Choice::Primary))
    } else {
        Box::new(TerminalConfirmer {
            theme: ColorfulTheme::default(),
        })
    };

    match args.command {
        Command::List => {
            config.validate()?;
            catalog::ensure_minimal(&config).context("Failed to refresh package catalog")?;
            let installed = scan_installed(&config).context("Failed to scan plugin directory")?;
            println!("Installed packages: {}", installed.len());
            for package in &installed {
                let state = if package.enabled { "enabled" } else { "disabled" };
                let alternates = store::list_alternates(&config, package.stable_id(), package.version());
                print!(
                    "  {} {} [{}] {} ({})",
                    package.identity.display_name,
                    package.version(),
                    package.stable_id(),
                    package.location_name,
                    state
                );
                if !alternates.is_empty() {
                    print!(" stored: {}", alternates.join(", "));
                }
                println!();
            }
        }
        Command::Install { source } => {
            if let RuntimeStatus::AwaitingFirstRun { config_path } = FileSystemCheck.check(&config) {
                anyhow::bail!(
                    "{} not found; launch the game once so BepInEx can generate it",
                    config_path.display()
                );
            }
            let outcome = operations::install(&config, &source, confirmer.as_mut())
                .context(format!("Failed to install {}", source.display()))?;
            match outcome {
                InstallOutcome::Installed(report) => {
                    match &report.identity {
                        Some(identity) => println!(
                            "Installed {} {} to {}",
                            identity.display_name,
                            identity.version,
                            report.target.display()
                        ),
                        None => println!("Installed dependency files to {}", report.target.display()),
                    }
                    if let Some(version) = &report.stashed_version {
                        println!("  previous version {version} kept in the version store");
                    }
                    if let Some(warning) = &report.warning {
                        println!("  note: {warning}");
                    }
                }
                InstallOutcome::KeptBoth { identity, stored_at } => println!(
                    "Stored {} {} as an alternate at {}",
                    identity.display_name,
                    identity.version,
                    stored_at.display()
                ),
                InstallOutcome::Canceled => println!("Install canceled"),
            }
        }
        Command::Enable { id } => toggle(&config, &id, true)?,
        Command::Disable { id } => toggle(&config, &id, false)?,
        Command::Switch { id, version } => {
            let outcome = operations::switch_version(&config, &id, &version)
                .context(format!("Failed to switch {id} to {version}"))?;
            println!(
                "{} is now at {}",
                outcome.identity.display_name, outcome.identity.version
            );
        }
        Command::Versions { id } => {
            config.validate()?;
            if let Some(entry) = catalog::find(&catalog::load(&config), &id) {
                println!("{} {} is active", entry.name, entry.version);
            }
            let versions = store::list_versions(&config, &id);
            if versions.is_empty() {
                println!("No stored versions for {id}");
            }
            for entry in versions {
                println!("  {}  {}", entry.version, entry.path.display());
            }
        }
        Command::Uninstall { id } => {
            let outcome = operations::uninstall(&config, &id, confirmer.as_mut())
                .context(format!("Failed to uninstall {id}"))?;
            match outcome {
                UninstallOutcome::Removed {
                    removed_files,
                    removed_versions,
                } => println!(
                    "Removed {id}: {removed_files} file(s), {} stored version(s)",
                    removed_versions.len()
                ),
                UninstallOutcome::Pruned {
                    removed_versions,
                    active_version,
                } => println!(
                    "Pruned {} stored version(s) of {id}; {active_version} is active",
                    removed_versions.len()
                ),
                UninstallOutcome::Canceled => println!("Uninstall canceled"),
            }
        }
        Command::RebuildIndex => {
            config.validate()?;
            let catalog = catalog::rebuild_from_disk(&config).context("Failed to rebuild catalog")?;
            println!("Catalog rebuilt: {} package(s)", catalog.len());
        }
        Command::Status => match FileSystemCheck.check(&config) {
            RuntimeStatus::Ready => println!("BepInEx is ready at {}", config.host_root().display()),
            RuntimeStatus::AwaitingFirstRun { config_path } => println!(
                "BepInEx is installed but {} is missing; launch the game once",
                config_path.display()
            ),
            RuntimeStatus::Missing { path } => println!("BepInEx setup incomplete: {} not found", path.display()),
        },
    }

    Ok(())
}

fn toggle(config: &ManagerConfig, id: &str, enabled: bool) -> anyhow::Result<()> {
    let package = operations::set_enabled(config, id, enabled)
        .context(format!("Failed to toggle {id}"))?;
    println!(
        "{} is now {}",
        package.identity.display_name,
        if package.enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
