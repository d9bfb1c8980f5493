//! 审计日志：记录每个已下载 / 已存在 / 被跳过的条目
//!
//! * `downloaded.log` – 下载成功与本地已存在的文件
//! * `skipped.log`    – 被过滤规则跳过的条目及原因
//!
//! 两个文件只追加，不截断；每次运行开头写一行会话分隔符。

use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const DOWNLOADED_LOG: &str = "downloaded.log";
pub const SKIPPED_LOG: &str = "skipped.log";

struct AuditFiles {
    downloaded: File,
    skipped: File,
}

/// 线程安全的审计日志
pub struct AuditLogger {
    files: Mutex<AuditFiles>,
    downloaded_path: PathBuf,
    skipped_path: PathBuf,
}

impl AuditLogger {
    /// 在 `log_dir` 下打开（必要时创建）两个日志文件并写入会话头
    pub fn new(log_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let downloaded_path = log_dir.join(DOWNLOADED_LOG);
        let skipped_path = log_dir.join(SKIPPED_LOG);

        let logger = Self {
            files: Mutex::new(AuditFiles {
                downloaded: open_append(&downloaded_path)?,
                skipped: open_append(&skipped_path)?,
            }),
            downloaded_path,
            skipped_path,
        };

        let header = format!(
            "--- session started at {} ---\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );
        {
            let mut files = logger.lock();
            files.downloaded.write_all(header.as_bytes())?;
            files.skipped.write_all(header.as_bytes())?;
        }

        Ok(logger)
    }

    pub fn downloaded_path(&self) -> &Path {
        &self.downloaded_path
    }

    pub fn skipped_path(&self) -> &Path {
        &self.skipped_path
    }

    pub fn record_downloaded(&self, remote_path: &str, local_path: &Path) -> io::Result<()> {
        let line = format!(
            "{} DOWNLOADED {} -> {}\n",
            timestamp(),
            remote_path,
            local_path.display()
        );
        self.lock().downloaded.write_all(line.as_bytes())
    }

    pub fn record_already_exists(&self, remote_path: &str, local_path: &Path) -> io::Result<()> {
        let line = format!(
            "{} EXISTS {} (local: {})\n",
            timestamp(),
            remote_path,
            local_path.display()
        );
        self.lock().downloaded.write_all(line.as_bytes())
    }

    pub fn record_skipped(&self, remote_path: &str, reason: &str) -> io::Result<()> {
        let line = format!("{} SKIPPED {} -- reason: {}\n", timestamp(), remote_path, reason);
        self.lock().skipped.write_all(line.as_bytes())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuditFiles> {
        // 写入失败不会破坏文件句柄，中毒的锁可以继续使用
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
