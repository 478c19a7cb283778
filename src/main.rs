//! Resource manager CLI
//!
//! Import, inspect and deploy launcher resources from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use launcher_resources::commands::{self, CreateInstancePayload};
use launcher_resources::core::resource::ChannelSink;
use launcher_resources::{init_tracing, AppState, LoaderType};

#[derive(Parser)]
#[command(name = "launcher-resources")]
#[command(version, about = "Import, identify and deploy Minecraft launcher resources", long_about = None)]
struct Cli {
    /// Data directory (defaults to the launcher's data folder)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import files or folders into the managed content area
    Import {
        paths: Vec<PathBuf>,

        /// Type or domain hint (e.g. "fabric", "resourcepacks", "*")
        #[arg(long)]
        hint: Option<String>,
    },

    /// Download and import a file
    ImportUrl {
        url: String,

        /// Expected SHA-1 of the download
        #[arg(long)]
        sha1: Option<String>,

        #[arg(long)]
        hint: Option<String>,
    },

    /// List known resources
    List {
        /// Only this domain (mods, resourcepacks, saves, modpacks, unknown)
        #[arg(long)]
        domain: Option<String>,
    },

    /// Look a resource up by hash, URI or source file (first match wins)
    Find {
        #[arg(long)]
        hash: Option<String>,
        #[arg(long)]
        uri: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Remove a resource and its stored content
    Remove { key: String },

    /// Change a resource's display name
    Rename { key: String, name: String },

    /// Re-check a resource's stored content
    Refresh { key: String },

    /// Copy resources out to a folder
    Export {
        #[arg(short, long)]
        output: PathBuf,
        keys: Vec<String>,
    },

    /// Create an instance
    CreateInstance {
        name: String,
        #[arg(long)]
        minecraft_version: String,
        #[arg(long, value_parser = parse_loader, default_value = "vanilla")]
        loader: LoaderType,
        #[arg(long)]
        loader_version: Option<String>,
    },

    /// List instances
    Instances,

    /// Delete an instance
    DeleteInstance { id: String },

    /// Deploy a resource into an instance
    Deploy { instance: String, key: String },

    /// Remove a deployed resource from an instance
    Undeploy { instance: String, key: String },

    /// Resources deployed into an instance
    Deployed { instance: String },
}

fn parse_loader(s: &str) -> Result<LoaderType, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("Unknown loader: '{}'", s))
}

fn print<T: Serialize>(result: Result<T, String>) -> Result<(), String> {
    let value = result?;
    let json = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), String> {
    init_tracing();
    let cli = Cli::parse();

    let (sink, mut events) = ChannelSink::channel(256);
    let sink = Arc::new(sink);
    let state = match cli.data_dir {
        Some(dir) => AppState::load_from(dir, sink).await,
        None => AppState::load(sink).await,
    }
    .map_err(|e| e.to_string())?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!("{:?}: {}", event.resource().hash, event.resource().name);
        }
    });

    match cli.command {
        Commands::Import { paths, hint } => {
            print(commands::import_files(&state, paths, hint.as_deref()).await)
        }
        Commands::ImportUrl { url, sha1, hint } => print(
            commands::import_url(&state, &url, sha1.as_deref(), hint.as_deref()).await,
        ),
        Commands::List { domain } => {
            print(commands::list_resources(&state, domain.as_deref()).await)
        }
        Commands::Find { hash, uri, file } => {
            print(commands::find_resource(&state, hash, uri, file).await)
        }
        Commands::Remove { key } => print(commands::remove_resource(&state, &key).await),
        Commands::Rename { key, name } => {
            print(commands::rename_resource(&state, &key, &name).await)
        }
        Commands::Refresh { key } => print(commands::refresh_resource(&state, &key).await),
        Commands::Export { output, keys } => {
            print(commands::export_resources(&state, &keys, &output).await)
        }
        Commands::CreateInstance {
            name,
            minecraft_version,
            loader,
            loader_version,
        } => print(
            commands::create_instance(
                &state,
                CreateInstancePayload {
                    name,
                    minecraft_version,
                    loader_type: loader,
                    loader_version,
                },
            )
            .await,
        ),
        Commands::Instances => print(commands::list_instances(&state).await),
        Commands::DeleteInstance { id } => print(commands::delete_instance(&state, &id).await),
        Commands::Deploy { instance, key } => {
            print(commands::deploy_resource(&state, &instance, &key).await)
        }
        Commands::Undeploy { instance, key } => {
            print(commands::undeploy_resource(&state, &instance, &key).await)
        }
        Commands::Deployed { instance } => {
            print(commands::list_deployed(&state, &instance).await)
        }
    }
}
