use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chunkdrop::common::config::{apply_overrides, load_config, ConfigOverrides};
use chunkdrop::send::{spawn_reporter, SendProgress, Uploader};
use chunkdrop::server;

#[derive(Parser)]
#[command(name = "chunkdrop")]
#[command(about = "Resumable, integrity-verified chunked file transfer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the receiving server over a base directory
    Serve {
        /// Base directory to receive files into
        base_dir: PathBuf,
        #[arg(long, help = "Port to listen on")]
        port: Option<u16>,
        #[arg(long, help = "Refuse uploads")]
        read_only: bool,
    },
    /// Upload files to a receiving server
    Send {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, help = "Receiver base URL, e.g. http://host:8080")]
        to: String,
        #[arg(long, help = "Target subdirectory on the receiver")]
        dir: Option<String>,
        #[arg(long, help = "Max chunks in flight per file")]
        concurrency: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chunkdrop=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            base_dir,
            port,
            read_only,
        } => {
            let overrides = ConfigOverrides {
                port,
                read_only: read_only.then_some(true),
                concurrency: None,
            };
            let config = apply_overrides(load_config()?, &overrides);
            server::serve(base_dir, config).await
        }
        Commands::Send {
            files,
            to,
            dir,
            concurrency,
        } => {
            let overrides = ConfigOverrides {
                port: None,
                read_only: None,
                concurrency,
            };
            let config = apply_overrides(load_config()?, &overrides);
            send_files(files, &to, dir, config.transfer).await
        }
    }
}

async fn send_files(
    files: Vec<PathBuf>,
    server_url: &str,
    remote_dir: Option<String>,
    settings: chunkdrop::common::TransferSettings,
) -> Result<()> {
    // Fail fast before any network traffic.
    let mut total_bytes = 0u64;
    for file in &files {
        let metadata = std::fs::metadata(file)
            .with_context(|| format!("File not found: {}", file.display()))?;
        if !metadata.is_file() {
            bail!("Not a regular file: {}", file.display());
        }
        total_bytes += metadata.len();
    }

    let uploader = Uploader::new(server_url, remote_dir, settings)?;
    let progress = Arc::new(SendProgress::new(total_bytes));
    let done = CancellationToken::new();
    let reporter = spawn_reporter(progress.clone(), settings.progress_interval(), done.clone());

    let mut failed = Vec::new();
    for file in &files {
        match uploader.upload_file(file, progress.clone()).await {
            Ok(report) => {
                println!(
                    "{}: {} bytes in {} chunk(s), crc32 {:#010x}",
                    report.file_name, report.bytes, report.chunks, report.file_checksum
                );
            }
            Err(e) => {
                tracing::error!(file = %file.display(), error = %format!("{e:#}"), "upload failed");
                failed.push(file.display().to_string());
            }
        }
    }

    done.cancel();
    reporter.await.context("progress reporter panicked")?;

    if !failed.is_empty() {
        bail!("{} file(s) failed to upload: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
