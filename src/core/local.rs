//! 本地目标目录

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// 本地镜像根目录
///
/// 本地路径 = 根目录 + 远程小写路径，所以本地树是大小写折叠后的远程结构。
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn resolve_path(&self, path_lower: &str) -> PathBuf {
        let path = path_lower.trim_start_matches('/');
        if path.is_empty() {
            self.base_path.clone()
        } else {
            self.base_path.join(path)
        }
    }

    /// 已存在的普通文件返回其大小；不存在或不是普通文件返回 None
    pub async fn existing_len(&self, path: &Path) -> io::Result<Option<u64>> {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 创建父目录；其它 worker 同时创建时不报错
    pub async fn ensure_parent(&self, path: &Path) -> io::Result<bool> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        if fs::metadata(parent).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Ok(false);
        }
        match fs::create_dir_all(parent).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && parent.is_dir() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// 以独占方式创建新文件并写入全部内容
    ///
    /// 文件已存在时返回 `Ok(false)`，不覆盖。写入失败时删除写了一半的文件。
    pub async fn write_new(&self, path: &Path, data: &[u8]) -> io::Result<bool> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e),
        };

        let written = async {
            file.write_all(data).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(path).await;
            return Err(e);
        }
        Ok(true)
    }
}
