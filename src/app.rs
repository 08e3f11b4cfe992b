use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytesize::ByteSize;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use paqbridge::client::Client;
use paqbridge::config::{APP_NAME, BridgeConfig, DEFAULT_METHOD, FILE_EXTENSION};
use paqbridge::options::CompressionOptions;

#[derive(Args, Clone, Copy)]
pub struct RunOptions {
    /// Run the transform on the calling thread instead of the worker pool.
    #[arg(long)]
    sync: bool,

    /// Number of worker threads (defaults to available parallelism).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compress a file.
    Compress {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Method string: level digit, block size exponent, arguments.
        #[arg(short, long, default_value = DEFAULT_METHOD)]
        method: String,

        /// File name recorded in the stream (defaults to the input's name).
        #[arg(long)]
        file_name: Option<String>,

        /// Comment recorded in the stream.
        #[arg(long, default_value = "")]
        comment: String,

        /// Do not embed a SHA-1 digest of the content.
        #[arg(long)]
        no_sha1: bool,

        #[command(flatten)]
        run: RunOptions,
    },

    /// Decompress a file.
    Decompress {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        run: RunOptions,
    },
}

#[derive(Parser)]
#[command(name = APP_NAME, version, about = "Compress and decompress files in memory, on the calling thread or a worker pool.")]
pub struct App {
    #[command(subcommand)]
    command: Commands,
}

impl App {
    pub fn init() -> Result<Self> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(Self::parse())
    }

    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Compress { input, output, method, file_name, comment, no_sha1, run } => {
                let output = output.unwrap_or_else(|| compressed_path(&input));
                let file_name = file_name.unwrap_or_else(|| input.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default());
                let options = CompressionOptions::default().with_method(method).with_file_name(file_name).with_comment(comment).with_sha1(!no_sha1);

                compress_file(&input, &output, &options, run).await
            }
            Commands::Decompress { input, output, run } => {
                let output = output.unwrap_or_else(|| decompressed_path(&input));
                decompress_file(&input, &output, run).await
            }
        }
    }
}

fn client(run: RunOptions) -> Result<Client> {
    let mut config = BridgeConfig::default();
    if let Some(threads) = run.threads {
        config = config.with_worker_threads(threads);
    }

    Client::new(&config)
}

async fn compress_file(input: &Path, output: &Path, options: &CompressionOptions, run: RunOptions) -> Result<()> {
    let data = tokio::fs::read(input).await.with_context(|| format!("failed to read {}", input.display()))?;
    let client = client(run)?;

    let compressed = if run.sync { client.compress_sync(&data, options) } else { client.compress(&data, options).await }.with_context(|| format!("compression failed: {}", input.display()))?;

    tokio::fs::write(output, &compressed).await.with_context(|| format!("failed to write {}", output.display()))?;
    info!(input = %input.display(), output = %output.display(), from = %ByteSize::b(data.len() as u64), to = %ByteSize::b(compressed.len() as u64), "compressed");

    Ok(())
}

async fn decompress_file(input: &Path, output: &Path, run: RunOptions) -> Result<()> {
    let data = tokio::fs::read(input).await.with_context(|| format!("failed to read {}", input.display()))?;
    let client = client(run)?;

    let restored = if run.sync { client.decompress_sync(&data) } else { client.decompress(&data).await }.with_context(|| format!("decompression failed: {}", input.display()))?;

    tokio::fs::write(output, &restored).await.with_context(|| format!("failed to write {}", output.display()))?;
    info!(input = %input.display(), output = %output.display(), from = %ByteSize::b(data.len() as u64), to = %ByteSize::b(restored.len() as u64), "decompressed");

    Ok(())
}

fn compressed_path(input: &Path) -> PathBuf {
    let mut path = input.as_os_str().to_owned();
    path.push(FILE_EXTENSION);
    PathBuf::from(path)
}

fn decompressed_path(input: &Path) -> PathBuf {
    let raw = input.to_string_lossy();
    match raw.strip_suffix(FILE_EXTENSION) {
        Some(stripped) if !stripped.is_empty() => PathBuf::from(stripped),
        _ => {
            let mut path = input.as_os_str().to_owned();
            path.push(".out");
            PathBuf::from(path)
        }
    }
}
