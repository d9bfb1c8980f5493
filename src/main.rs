use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mirrortools_lib::commands;
use mirrortools_lib::config::MirrorConfig;
use mirrortools_lib::logging::{log_dir, LogConfig, SizeRotatingWriter};
use mirrortools_lib::remote::{create_remote, normalize_path, RemoteSource};
use std::path::{Path, PathBuf};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "mirrortools")]
#[command(version)]
#[command(about = "Mirror a remote file store into a local directory tree")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./mirror.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recursively download all files in path, or the entire remote if none given
    DownloadRecursive {
        /// Skip build artifacts, .git dirs, and deleted/trashed files
        #[arg(long)]
        skip_noise: bool,

        /// Print the run report as JSON when done
        #[arg(long)]
        json: bool,

        /// Remote path to mirror
        path: Option<String>,
    },

    /// Show disk usage (size) for path
    Du {
        /// Remote path
        path: Option<String>,
    },

    /// List the contents of a folder
    Ls {
        /// Remote path
        path: Option<String>,
    },
}

/// 初始化日志系统：控制台 + 可选的文件日志
fn init_logging(base_path: &Path, config: &LogConfig, verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        config.tracing_level()
    };

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["opendal=warn", "hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    // 文件日志创建失败时只输出到控制台
    let file_layer = config
        .enabled
        .then(|| SizeRotatingWriter::new(&log_dir(base_path), config.max_size_mb).ok())
        .flatten()
        .map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
        });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let base_path = std::env::current_dir().context("无法获取当前目录")?;

    let config = match &cli.config {
        Some(path) => MirrorConfig::load_file(path),
        None => MirrorConfig::load(&base_path),
    };
    let log_config = config.as_ref().map(|c| c.log.clone()).unwrap_or_default();
    init_logging(&base_path, &log_config, cli.verbose);
    let config = config?;

    match cli.command {
        Commands::DownloadRecursive {
            skip_noise,
            json,
            path,
        } => {
            let path = normalize_path(path.as_deref().unwrap_or_default());
            let report = commands::download_recursive(&config, &base_path, &path, skip_noise).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            if report.failed_workers > 0 {
                bail!("{} folder traversal(s) failed", report.failed_workers);
            }
        }
        Commands::Du { path } => {
            let path = normalize_path(path.as_deref().unwrap_or_default());
            let remote = create_remote(&config.remote)?;
            let rows = commands::disk_usage(remote.as_ref(), &path).await?;
            for line in commands::render_usage(&rows) {
                println!("{}", line);
            }
        }
        Commands::Ls { path } => {
            let path = normalize_path(path.as_deref().unwrap_or_default());
            let remote = create_remote(&config.remote)?;
            let entries = remote
                .list(&path)
                .await
                .with_context(|| format!("列出目录失败: {}", path))?;
            println!("Listing path \"{}\"...", path);
            for line in commands::render_listing(&entries) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}
