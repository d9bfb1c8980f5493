//! du 命令：统计远程目录大小

use crate::remote::{RemoteEntry, RemoteSource};
use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};

/// 递归统计目录下所有文件的大小
pub fn folder_size<'a>(remote: &'a dyn RemoteSource, path: &'a str) -> BoxFuture<'a, Result<u64>> {
    async move {
        let entries = remote
            .list(path)
            .await
            .with_context(|| format!("列出目录失败: {}", path))?;

        let mut total = 0;
        for entry in &entries {
            total += entry_size(remote, entry).await?;
        }
        Ok(total)
    }
    .boxed()
}

async fn entry_size(remote: &dyn RemoteSource, entry: &RemoteEntry) -> Result<u64> {
    match entry {
        RemoteEntry::Folder { path, .. } => folder_size(remote, path.display()).await,
        RemoteEntry::File { size, .. } => Ok(*size),
        RemoteEntry::Deleted { .. } | RemoteEntry::Unsupported { .. } => Ok(0),
    }
}

/// 每个直接子项的大小，最后一行为总计
pub async fn disk_usage(remote: &dyn RemoteSource, path: &str) -> Result<Vec<(String, u64)>> {
    let entries = remote
        .list(path)
        .await
        .with_context(|| format!("列出目录失败: {}", path))?;

    let mut rows = Vec::with_capacity(entries.len() + 1);
    let mut total = 0;
    for entry in &entries {
        let size = entry_size(remote, entry).await?;
        total += size;
        rows.push((entry.path().display().to_string(), size));
    }
    rows.push((if path.is_empty() { "/".to_string() } else { path.to_string() }, total));
    Ok(rows)
}

/// 人类可读的大小
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

pub fn render_usage(rows: &[(String, u64)]) -> Vec<String> {
    rows.iter()
        .map(|(path, size)| format!("{:>10}  {}", format_size(*size), path))
        .collect()
}
