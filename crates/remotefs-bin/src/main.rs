use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use remotefs_core::client::RpcClient;
use remotefs_core::config::RemoteFsConfig;
use remotefs_core::server::Server;
use remotefs_core::vfs::CopyOptions;
use remotefs_platform::filesystem::{FileType, RenameOptions, WriteOptions};

#[derive(Parser, Debug)]
#[command(name = "remotefs")]
#[command(about = "Serve or browse a remote in-memory filesystem over WebSocket")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(long, env = "REMOTEFS_CONFIG_PATH", global = true)]
    config_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "REMOTEFS_LOG_LEVEL", global = true)]
    log_level: String,

    /// Server URL (e.g., ws://127.0.0.1:7878 or https://host)
    #[arg(long, env = "REMOTEFS_URL", global = true)]
    url: Option<String>,

    /// Authorization header value sent when connecting
    #[arg(long, env = "REMOTEFS_AUTH_HEADER", global = true)]
    auth_header: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reference server with an empty tree
    Serve {
        /// Address to listen on
        #[arg(long)]
        listen: Option<String>,
        /// Require `Authorization: Bearer <token>` from clients
        #[arg(long)]
        auth_token: Option<String>,
    },
    /// Show type, times and size of an entry
    Stat { path: String },
    /// List a directory
    Ls { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Print a file to stdout
    Cat { path: String },
    /// Write a file from a local file or inline text
    Put {
        path: String,
        /// Local file to upload
        #[arg(long, conflicts_with = "data")]
        from: Option<PathBuf>,
        /// Inline content
        #[arg(long)]
        data: Option<String>,
        /// Fail if the file does not exist yet
        #[arg(long)]
        no_create: bool,
        /// Replace an existing file
        #[arg(long)]
        overwrite: bool,
    },
    /// Delete an entry and everything below it
    Rm { path: String },
    /// Move or rename an entry
    Mv {
        old_path: String,
        new_path: String,
        #[arg(long)]
        overwrite: bool,
    },
    /// Copy a file
    Cp {
        source: String,
        destination: String,
        #[arg(long)]
        overwrite: bool,
    },
    /// Register a watch (acknowledged, no events are delivered)
    Watch {
        path: String,
        #[arg(long)]
        recursive: bool,
        #[arg(long = "exclude")]
        excludes: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config_path
        .map(PathBuf::from)
        .unwrap_or_else(RemoteFsConfig::default_path);

    let mut config = if config_path.exists() {
        info!("loading config from {}", config_path.display());
        RemoteFsConfig::load(&config_path)?
    } else {
        RemoteFsConfig::default()
    };

    // CLI args override config file
    if let Some(url) = cli.url {
        config.client.url = url;
    }
    if let Some(auth) = cli.auth_header {
        config.client.auth_header = Some(auth);
    }

    match cli.command {
        Commands::Serve { listen, auth_token } => {
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            if let Some(token) = auth_token {
                config.server.auth_token = Some(token);
            }
            run_server(config).await
        }
        command => {
            let client = RpcClient::new(config.client);
            client.connect().await.context("failed to connect")?;
            let result = run_command(&client, command).await;
            client.close().await;
            if let Err(e) = &result {
                error!("{:#}", e);
            }
            result
        }
    }
}

async fn run_server(config: RemoteFsConfig) -> Result<()> {
    info!("remotefs v{} starting", env!("CARGO_PKG_VERSION"));
    let server = Server::bind(&config.server).await?;

    tokio::select! {
        result = server.serve() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
            Ok(())
        }
    }
}

async fn run_command(client: &RpcClient, command: Commands) -> Result<()> {
    match command {
        Commands::Serve { .. } => anyhow::bail!("serve is not a client command"),
        Commands::Stat { path } => {
            let stat = client.stat(&path).await?;
            println!("{}", serde_json::to_string_pretty(&stat)?);
        }
        Commands::Ls { path } => {
            for entry in client.read_directory(&path).await? {
                let marker = if entry.file_type.contains(FileType::DIRECTORY) {
                    "/"
                } else {
                    ""
                };
                println!("{}{}", entry.name, marker);
            }
        }
        Commands::Mkdir { path } => client.create_directory(&path).await?,
        Commands::Cat { path } => {
            let content = client.read_file(&path).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
        Commands::Put {
            path,
            from,
            data,
            no_create,
            overwrite,
        } => {
            let content = match (from, data) {
                (Some(file), _) => std::fs::read(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?,
                (None, Some(text)) => text.into_bytes(),
                (None, None) => Vec::new(),
            };
            let options = WriteOptions {
                create: !no_create,
                overwrite,
            };
            let created = client.write_file(&path, content, options).await?;
            info!("{} {}", if created { "created" } else { "updated" }, path);
        }
        Commands::Rm { path } => client.delete(&path).await?,
        Commands::Mv {
            old_path,
            new_path,
            overwrite,
        } => {
            client
                .rename(&old_path, &new_path, RenameOptions { overwrite })
                .await?
        }
        Commands::Cp {
            source,
            destination,
            overwrite,
        } => {
            client
                .copy(&source, &destination, CopyOptions { overwrite })
                .await?
        }
        Commands::Watch {
            path,
            recursive,
            excludes,
        } => {
            client.watch(&path, recursive, excludes).await?;
            info!("watch registered on {}", path);
        }
    }
    Ok(())
}
