use crate::core::audit::AuditLogger;
use crate::core::filter::SkipFilter;
use crate::core::local::LocalStore;
use crate::core::pool::WorkQueue;
use crate::error::{MirrorError, Result};
use crate::remote::{normalize_path, RemoteEntry, RemoteSource};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// 单个文件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64 },
    AlreadyExists,
    Skipped,
    /// 另一个 worker 先写入了同一路径，内容被丢弃
    LostRace,
}

/// 运行统计
#[derive(Debug, Default)]
struct RunStats {
    files_downloaded: AtomicU64,
    files_existing: AtomicU64,
    entries_skipped: AtomicU64,
    bytes_downloaded: AtomicU64,
}

/// 运行报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub files_downloaded: u64,
    pub files_existing: u64,
    pub entries_skipped: u64,
    pub bytes_downloaded: u64,
    /// 因错误中止的 worker 数
    pub failed_workers: u64,
}

/// 文件夹条目的处理方式
#[derive(Clone, Copy)]
enum FolderMode<'a> {
    /// worker 内部：直接递归
    Recurse,
    /// 根目录分发：放入共享队列
    Enqueue(&'a WorkQueue),
}

/// 同步引擎：遍历远程目录并下载本地缺失的文件
pub struct SyncEngine {
    remote: Arc<dyn RemoteSource>,
    local: LocalStore,
    filter: SkipFilter,
    logger: Arc<AuditLogger>,
    /// 遍历根目录（规范化后的显示路径）
    root: String,
    /// 仅同步这些顶层名称，空表示全部
    restrict_to: Vec<String>,
    stats: RunStats,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        local: LocalStore,
        filter: SkipFilter,
        logger: Arc<AuditLogger>,
    ) -> Self {
        Self {
            remote,
            local,
            filter,
            logger,
            root: String::new(),
            restrict_to: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.root = normalize_path(root);
        self
    }

    pub fn with_restrictions(mut self, names: Vec<String>) -> Self {
        self.restrict_to = names;
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            files_downloaded: self.stats.files_downloaded.load(Ordering::Relaxed),
            files_existing: self.stats.files_existing.load(Ordering::Relaxed),
            entries_skipped: self.stats.entries_skipped.load(Ordering::Relaxed),
            bytes_downloaded: self.stats.bytes_downloaded.load(Ordering::Relaxed),
            failed_workers: 0,
        }
    }

    /// 列出远程目录
    pub async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        debug!("列出远程目录: {}", if path.is_empty() { "/" } else { path });
        self.remote
            .list(path)
            .await
            .map_err(|e| MirrorError::transport(path, e))
    }

    /// 递归遍历并下载 `path` 下的所有内容（worker 使用）
    pub fn traverse<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let entries = self.list(path).await?;
            let at_root = normalize_path(path) == self.root;
            self.process_entries(entries, at_root, FolderMode::Recurse).await
        }
        .boxed()
    }

    /// 根目录分发：文件直接下载，文件夹放入队列
    pub async fn dispatch_root(&self, entries: Vec<RemoteEntry>, queue: &WorkQueue) -> Result<()> {
        self.process_entries(entries, true, FolderMode::Enqueue(queue)).await
    }

    async fn process_entries(
        &self,
        entries: Vec<RemoteEntry>,
        at_root: bool,
        folders: FolderMode<'_>,
    ) -> Result<()> {
        for entry in entries {
            // 顶层名称不在列表中时直接结束本层（后续同级条目也不再处理）
            if at_root
                && !self.restrict_to.is_empty()
                && !self.restrict_to.iter().any(|name| name == entry.name())
            {
                debug!("{} 不在同步列表中，停止处理根目录", entry.name());
                return Ok(());
            }

            if self.skip_if_filtered(&entry)? {
                continue;
            }

            match &entry {
                RemoteEntry::Folder { path, .. } => match folders {
                    FolderMode::Recurse => self.traverse(path.display()).await?,
                    FolderMode::Enqueue(queue) => queue.push(path.display().to_string()),
                },
                RemoteEntry::File { .. } => {
                    self.download_file(&entry).await?;
                }
                // 未开启过滤时已删除条目静默忽略
                RemoteEntry::Deleted { .. } => {}
                RemoteEntry::Unsupported { path, kind, .. } => {
                    return Err(MirrorError::UnexpectedEntry {
                        path: path.display().to_string(),
                        kind: kind.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// 过滤命中时记录并返回 true
    fn skip_if_filtered(&self, entry: &RemoteEntry) -> Result<bool> {
        let decision = self.filter.decision(entry);
        if !decision.skip {
            return Ok(false);
        }

        let path = entry.path().lower();
        let path = if path.is_empty() { entry.name() } else { path };
        info!("跳过 {} ({})", path, decision.reason);
        self.logger
            .record_skipped(path, &decision.reason)
            .map_err(|e| MirrorError::local_io(self.logger.skipped_path(), e))?;
        self.stats.entries_skipped.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// 下载单个文件；本地已有同样大小的文件时跳过
    pub async fn download_file(&self, entry: &RemoteEntry) -> Result<DownloadOutcome> {
        let RemoteEntry::File { path, size, .. } = entry else {
            return Err(MirrorError::UnexpectedEntry {
                path: entry.path().display().to_string(),
                kind: entry.kind().to_string(),
            });
        };

        if self.skip_if_filtered(entry)? {
            return Ok(DownloadOutcome::Skipped);
        }

        let local_path = self.local.resolve_path(path.lower());

        // 只比较大小，不校验内容
        let existing = self
            .local
            .existing_len(&local_path)
            .await
            .map_err(|e| MirrorError::local_io(&local_path, e))?;
        if existing == Some(*size) {
            info!("文件已存在: {}", path.lower());
            self.logger
                .record_already_exists(path.lower(), &local_path)
                .map_err(|e| MirrorError::local_io(self.logger.downloaded_path(), e))?;
            self.stats.files_existing.fetch_add(1, Ordering::Relaxed);
            return Ok(DownloadOutcome::AlreadyExists);
        }

        let data = self
            .remote
            .read(path.display())
            .await
            .map_err(|e| MirrorError::transport(path.display(), e))?;

        if self
            .local
            .ensure_parent(&local_path)
            .await
            .map_err(|e| MirrorError::local_io(&local_path, e))?
        {
            if let Some(parent) = local_path.parent() {
                info!("创建目录 {}", parent.display());
            }
        }

        let created = self
            .local
            .write_new(&local_path, &data)
            .await
            .map_err(|e| MirrorError::local_io(&local_path, e))?;
        if !created {
            // 先写入者获胜
            debug!("{} 已被其它 worker 写入，丢弃", local_path.display());
            return Ok(DownloadOutcome::LostRace);
        }

        info!("创建文件 {}", local_path.display());
        self.logger
            .record_downloaded(path.lower(), &local_path)
            .map_err(|e| MirrorError::local_io(self.logger.downloaded_path(), e))?;

        let bytes = data.len() as u64;
        self.stats.files_downloaded.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
        Ok(DownloadOutcome::Downloaded { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryRemote;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        dest: std::path::PathBuf,
        log_dir: std::path::PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let dest = dir.path().join("mirror");
            let log_dir = dir.path().join("log");
            Self {
                _dir: dir,
                dest,
                log_dir,
            }
        }

        fn engine(&self, remote: Arc<MemoryRemote>, skip_noise: bool) -> SyncEngine {
            let logger = Arc::new(AuditLogger::new(&self.log_dir).unwrap());
            SyncEngine::new(
                remote,
                LocalStore::new(&self.dest),
                SkipFilter::new(skip_noise),
                logger,
            )
        }

        fn lines(&self, file: &str) -> Vec<String> {
            fs::read_to_string(self.log_dir.join(file))
                .unwrap()
                .lines()
                .filter(|l| !l.starts_with("--- session"))
                .map(str::to_string)
                .collect()
        }
    }

    fn count(lines: &[String], marker: &str) -> usize {
        lines.iter().filter(|l| l.contains(marker)).count()
    }

    #[tokio::test]
    async fn test_traverse_downloads_tree_with_lowercase_paths() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote
            .add_folder("/Photos")
            .add_file("/Photos/Beach.JPG", b"jpeg-data")
            .add_folder("/Photos/2024")
            .add_file("/Photos/2024/a.png", b"png")
            .add_file("/notes.txt", b"0123456789");

        let engine = fx.engine(remote, false);
        engine.traverse("").await.unwrap();

        assert_eq!(fs::read(fx.dest.join("photos/beach.jpg")).unwrap(), b"jpeg-data");
        assert_eq!(fs::read(fx.dest.join("photos/2024/a.png")).unwrap(), b"png");
        assert_eq!(fs::read(fx.dest.join("notes.txt")).unwrap(), b"0123456789");

        let downloaded = fx.lines("downloaded.log");
        assert_eq!(count(&downloaded, " DOWNLOADED "), 3);
        assert!(downloaded
            .iter()
            .any(|l| l.contains("DOWNLOADED /photos/beach.jpg -> ")));
        assert!(fx.lines("skipped.log").is_empty());

        let report = engine.report();
        assert_eq!(report.files_downloaded, 3);
        assert_eq!(report.bytes_downloaded, 22);
    }

    #[tokio::test]
    async fn test_existing_file_with_same_size_is_not_read() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote.add_file("/a.txt", b"remote!");

        // 大小相同但内容不同：仍视为已同步
        fs::create_dir_all(&fx.dest).unwrap();
        fs::write(fx.dest.join("a.txt"), b"local!!").unwrap();

        let engine = fx.engine(remote.clone(), false);
        let outcome = engine
            .download_file(&RemoteEntry::file("/a.txt", 7))
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::AlreadyExists);
        assert_eq!(remote.read_count(), 0);
        assert_eq!(fs::read(fx.dest.join("a.txt")).unwrap(), b"local!!");

        let downloaded = fx.lines("downloaded.log");
        assert_eq!(downloaded.len(), 1);
        assert!(downloaded[0].contains(" EXISTS /a.txt (local: "));
    }

    #[tokio::test]
    async fn test_size_mismatch_keeps_first_writer() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote.add_file("/a.txt", b"new content");

        fs::create_dir_all(&fx.dest).unwrap();
        fs::write(fx.dest.join("a.txt"), b"old").unwrap();

        let engine = fx.engine(remote.clone(), false);
        let outcome = engine
            .download_file(&RemoteEntry::file("/a.txt", 11))
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::LostRace);
        assert_eq!(remote.read_count(), 1);
        assert_eq!(fs::read(fx.dest.join("a.txt")).unwrap(), b"old");
        assert!(fx.lines("downloaded.log").is_empty());
    }

    #[tokio::test]
    async fn test_noise_is_skipped_and_logged() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote
            .add_folder("/repo")
            .add_folder("/repo/.git")
            .add_file("/repo/.git/HEAD", b"ref")
            .add_file("/repo/build.o", b"obj")
            .add_file("/repo/main.c", b"int main;")
            .add_entry(RemoteEntry::deleted("/repo/old.c"));

        let engine = fx.engine(remote.clone(), true);
        engine.traverse("").await.unwrap();

        assert!(fx.dest.join("repo/main.c").exists());
        assert!(!fx.dest.join("repo/build.o").exists());
        assert!(!fx.dest.join("repo/.git").exists());

        let skipped = fx.lines("skipped.log");
        assert_eq!(skipped.len(), 3);
        assert!(skipped[0].ends_with("SKIPPED /repo/.git -- reason: git: version-control directory (.git)"));
        assert!(skipped[1].ends_with("SKIPPED /repo/build.o -- reason: build: file extension .o"));
        assert!(skipped[2].ends_with("SKIPPED /repo/old.c -- reason: deleted: remote entry marked as deleted"));
        assert_eq!(engine.report().entries_skipped, 3);
    }

    #[tokio::test]
    async fn test_skip_records_use_lowercase_path() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote
            .add_folder("/Src")
            .add_file("/Src/Main.O", b"obj")
            .add_file("/Src/Main.C", b"int main;");

        let engine = fx.engine(remote, true);
        engine.traverse("").await.unwrap();

        let skipped = fx.lines("skipped.log");
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].ends_with("SKIPPED /src/main.o -- reason: build: file extension .O"));

        let downloaded = fx.lines("downloaded.log");
        assert!(downloaded[0].contains("DOWNLOADED /src/main.c -> "));
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let report = RunReport {
            files_downloaded: 2,
            files_existing: 1,
            entries_skipped: 3,
            bytes_downloaded: 42,
            failed_workers: 0,
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["filesDownloaded"], 2);
        assert_eq!(value["filesExisting"], 1);
        assert_eq!(value["entriesSkipped"], 3);
        assert_eq!(value["bytesDownloaded"], 42);
        assert_eq!(value["failedWorkers"], 0);
    }

    #[tokio::test]
    async fn test_deleted_entries_ignored_without_filter() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote
            .add_entry(RemoteEntry::deleted("/gone.txt"))
            .add_file("/kept.txt", b"k");

        let engine = fx.engine(remote, false);
        engine.traverse("").await.unwrap();

        assert!(!fx.dest.join("gone.txt").exists());
        assert!(fx.dest.join("kept.txt").exists());
        assert!(fx.lines("skipped.log").is_empty());
        assert_eq!(fx.lines("downloaded.log").len(), 1);
    }

    #[tokio::test]
    async fn test_download_file_refilters_deep_entries() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote.add_file("/proj/node_modules/lib/index.js", b"js");

        let engine = fx.engine(remote.clone(), true);
        let outcome = engine
            .download_file(&RemoteEntry::file("/proj/node_modules/lib/index.js", 2))
            .await
            .unwrap();

        assert_eq!(outcome, DownloadOutcome::Skipped);
        assert_eq!(remote.read_count(), 0);
        let skipped = fx.lines("skipped.log");
        assert!(skipped[0].ends_with("reason: build: inside build/cache directory (node_modules)"));
    }

    #[tokio::test]
    async fn test_unsupported_entry_is_fatal() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote.add_entry(RemoteEntry::Unsupported {
            path: crate::remote::RemotePath::new("/socket"),
            name: "socket".to_string(),
            kind: "symlink".to_string(),
        });

        let engine = fx.engine(remote, false);
        let err = engine.traverse("").await.unwrap_err();
        match err {
            MirrorError::UnexpectedEntry { path, kind } => {
                assert_eq!(path, "/socket");
                assert_eq!(kind, "symlink");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_restriction_stops_at_first_unlisted_name() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote
            .add_file("/Keep.txt", b"1")
            .add_file("/other.txt", b"2")
            .add_file("/Keep2.txt", b"3");

        let engine = fx
            .engine(remote, false)
            .with_restrictions(vec!["Keep.txt".to_string(), "Keep2.txt".to_string()]);
        engine.traverse("").await.unwrap();

        assert!(fx.dest.join("keep.txt").exists());
        // other.txt 结束了根目录处理，Keep2.txt 也不会下载
        assert!(!fx.dest.join("other.txt").exists());
        assert!(!fx.dest.join("keep2.txt").exists());
    }

    #[tokio::test]
    async fn test_restriction_only_applies_at_root() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote
            .add_folder("/Docs")
            .add_file("/Docs/a.txt", b"a")
            .add_file("/Docs/b.txt", b"b");

        let engine = fx
            .engine(remote, false)
            .with_restrictions(vec!["Docs".to_string()]);
        engine.traverse("").await.unwrap();

        assert!(fx.dest.join("docs/a.txt").exists());
        assert!(fx.dest.join("docs/b.txt").exists());
    }

    #[tokio::test]
    async fn test_read_failure_propagates_with_path() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote.add_file("/broken.bin", b"xx").fail_on("/broken.bin");

        let engine = fx.engine(remote, false);
        let err = engine
            .download_file(&RemoteEntry::file("/broken.bin", 2))
            .await
            .unwrap_err();

        assert!(matches!(err, MirrorError::Transport { ref path, .. } if path == "/broken.bin"));
        assert!(!fx.dest.join("broken.bin").exists());
        assert!(!Path::new(&fx.dest).exists());
    }

    #[tokio::test]
    async fn test_second_run_only_reports_existing() {
        let fx = Fixture::new();
        let remote = Arc::new(MemoryRemote::new());
        remote
            .add_folder("/a")
            .add_file("/a/one.txt", b"1")
            .add_file("/two.txt", b"22");

        fx.engine(remote.clone(), false).traverse("").await.unwrap();
        let first = fx.lines("downloaded.log");

        fx.engine(remote, false).traverse("").await.unwrap();
        let all = fx.lines("downloaded.log");
        let second = &all[first.len()..];

        assert_eq!(count(second, " DOWNLOADED "), 0);
        assert_eq!(count(second, " EXISTS "), 2);
    }
}
