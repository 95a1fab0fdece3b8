//! Relay store command line.
//!
//! Inspects and edits the category files under a data root, or follows
//! them live while other programs edit them.

use std::{error::Error, path::PathBuf, process};

use clap::{Parser, Subcommand};
use relay_store::{
    Category, DataDistributor,
    config::{RelayPaths, Settings},
    model::Groups,
    tracing_config,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "relay-store")]
#[command(about = "Inspect and edit Relay's local data files")]
struct Cli {
    /// Data root to use instead of the configured one
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current snapshot, or one category, as JSON
    Show {
        /// groups, contacts, servers or on-call
        category: Option<Category>,
    },
    /// Print the data root and the file backing each category
    Path,
    /// Follow external edits and print every published snapshot until Ctrl-C
    Watch,
    /// Edit group membership
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
}

#[derive(Subcommand)]
enum GroupAction {
    /// Add a member, creating the group if needed
    Add { group: String, email: String },
    /// Remove a member from a group
    Remove { group: String, email: String },
    /// Rename a group, keeping its members
    Rename { from: String, to: String },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let paths = RelayPaths::from_env()?;
    let settings = Settings::load(&paths)?;

    let _log_guard = match cli.command {
        Commands::Watch => Some(tracing_config::init_with_file(
            &paths.log_dir(),
            settings.log_level,
        )?),
        _ => {
            tracing_config::init(settings.log_level)?;
            None
        }
    };

    let data_root = cli
        .data_root
        .unwrap_or_else(|| settings.data_root(&paths));
    let distributor = DataDistributor::open(data_root).await?;

    match cli.command {
        Commands::Show { category } => show(&distributor, category)?,
        Commands::Path => {
            println!("{}", distributor.data_root().display());
            for category in Category::ALL {
                println!("{category:>8}  {}", distributor.path_for(category).display());
            }
        }
        Commands::Watch => watch(&distributor, settings.watch).await?,
        Commands::Group { action } => group(&distributor, action).await?,
    }

    Ok(())
}

fn show(distributor: &DataDistributor, category: Option<Category>) -> Result<(), Box<dyn Error>> {
    let snapshot = distributor.snapshot();
    let value = match category {
        Some(category) => snapshot.category_json(category)?,
        None => serde_json::to_value(&*snapshot)?,
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn watch(distributor: &DataDistributor, enabled: bool) -> Result<(), Box<dyn Error>> {
    if enabled {
        distributor.start_watching()?;
    } else {
        info!("Watching disabled in settings, only showing the current snapshot");
    }

    let _subscription = distributor.subscribe(|snapshot| {
        println!(
            "revision {} at {}: {} groups, {} contacts, {} servers, {} on-call entries",
            snapshot.revision(),
            snapshot.last_updated().to_rfc3339(),
            snapshot.groups().0.len(),
            snapshot.contacts().0.len(),
            snapshot.servers().0.len(),
            snapshot.on_call().0.len(),
        );
    });

    tokio::signal::ctrl_c().await?;
    distributor.shutdown();
    Ok(())
}

async fn group(distributor: &DataDistributor, action: GroupAction) -> Result<(), Box<dyn Error>> {
    let mut changed = false;

    let outcome = match action {
        GroupAction::Add { group, email } => {
            distributor
                .mutate(|mut groups: Groups| {
                    changed = groups.add_member(&group, &email);
                    groups
                })
                .await?;
            if changed {
                format!("Added {email} to {group}")
            } else {
                format!("{email} is already in {group}")
            }
        }
        GroupAction::Remove { group, email } => {
            distributor
                .mutate(|mut groups: Groups| {
                    changed = groups.remove_member(&group, &email);
                    groups
                })
                .await?;
            if changed {
                format!("Removed {email} from {group}")
            } else {
                format!("{email} is not in {group}")
            }
        }
        GroupAction::Rename { from, to } => {
            distributor
                .mutate(|mut groups: Groups| {
                    changed = groups.rename_group(&from, &to);
                    groups
                })
                .await?;
            if changed {
                format!("Renamed {from} to {to}")
            } else {
                format!("Cannot rename {from} to {to}: source missing or target exists")
            }
        }
    };

    println!("{outcome}");
    Ok(())
}
