//! download-recursive 命令

use crate::config::MirrorConfig;
use crate::core::{AuditLogger, LocalStore, RunReport, SkipFilter, SyncEngine, WorkQueue, WorkerPool};
use crate::error::{MirrorError, Result};
use crate::logging::log_dir;
use crate::remote::{create_remote, RemoteSource};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 递归下载 `path`（空表示整个远程）下的所有文件
pub async fn download_recursive(
    config: &MirrorConfig,
    base_path: &Path,
    path: &str,
    skip_noise: bool,
) -> Result<RunReport> {
    let remote = create_remote(&config.remote)?;
    info!("数据源: {}", remote.name());
    run_mirror(remote, config, base_path, path, skip_noise).await
}

/// 组装审计日志、引擎与 worker 池并运行
pub async fn run_mirror(
    remote: Arc<dyn RemoteSource>,
    config: &MirrorConfig,
    base_path: &Path,
    path: &str,
    skip_noise: bool,
) -> Result<RunReport> {
    let log_dir = log_dir(base_path);
    let logger = AuditLogger::new(&log_dir).map_err(|e| MirrorError::local_io(&log_dir, e))?;

    let engine = SyncEngine::new(
        remote,
        LocalStore::new(&config.dest_dir),
        SkipFilter::new(skip_noise || config.skip_noise),
        Arc::new(logger),
    )
    .with_root(path)
    .with_restrictions(config.restrict_to.clone());

    let pool = WorkerPool::new(Arc::new(engine), Arc::new(WorkQueue::new()))
        .with_max_workers(config.max_workers);
    let report = pool.run().await?;

    let root = if path.is_empty() { "the entire remote" } else { path };
    if report.failed_workers == 0 {
        info!("All files in {} downloaded", root);
    } else {
        warn!("{} 个文件夹处理失败，{} 未完整下载", report.failed_workers, root);
    }
    info!(
        "下载 {} 个文件 ({} 字节)，已存在 {} 个，跳过 {} 项，失败 worker {} 个",
        report.files_downloaded,
        report.bytes_downloaded,
        report.files_existing,
        report.entries_skipped,
        report.failed_workers
    );
    Ok(report)
}
