//! Command-line interface.

mod doctor;
mod init;
mod list;
mod serve;
mod upload;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "beekit", version, about = "Client toolkit for the bee agent platform")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload files, optionally attaching them to a vector store.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Vector store to attach readable files to.
        #[arg(long, env = "BEEKIT_VECTOR_STORE")]
        vector_store: Option<String>,
        /// Conversation thread the uploads belong to.
        #[arg(long)]
        thread: Option<String>,
    },
    /// List vector stores, or one store's files.
    List {
        /// Vector store whose files to list; omit to list the stores.
        vector_store: Option<String>,
        /// Page size.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Follow a pending vector store until it settles.
    Watch {
        /// Vector store id.
        vector_store_id: String,
    },
    /// Run the sandbox bridge WebSocket server.
    Serve,
    /// Diagnose configuration and connectivity.
    Doctor {
        /// Exit non-zero when any check fails.
        #[arg(long)]
        strict: bool,
    },
    /// Save credentials to ~/.beekit/.env for later runs.
    Init {
        /// Platform API key.
        #[arg(long, env = "BEEKIT_API_KEY", hide_env_values = true)]
        api_key: String,
        /// Platform API base URL.
        #[arg(long)]
        base_url: Option<String>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Upload {
            paths,
            vector_store,
            thread,
        } => {
            let config = Config::load()?;
            upload::run_upload_command(paths, vector_store, thread, &config).await
        }
        Command::List {
            vector_store,
            limit,
        } => {
            let config = Config::load()?;
            list::run_list_command(vector_store, limit, &config).await
        }
        Command::Watch { vector_store_id } => {
            let config = Config::load()?;
            watch::run_watch_command(vector_store_id, &config).await
        }
        Command::Serve => {
            let config = Config::load()?;
            serve::run_serve_command(&config).await
        }
        Command::Doctor { strict } => doctor::run_doctor_command(strict).await,
        Command::Init { api_key, base_url } => init::run_init_command(api_key, base_url),
    }
}
