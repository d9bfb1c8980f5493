pub mod operator;

#[cfg(test)]
pub mod memory;

use crate::config::{RemoteConfig, RemoteType};
use crate::error::MirrorError;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use operator::OperatorRemote;

/// 远程路径：规范形式（小写，用于匹配和拼接本地路径）+ 显示形式（保留大小写）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    lower: String,
    display: String,
}

impl RemotePath {
    /// 由显示路径构造，统一为以 `/` 开头、无结尾 `/` 的形式
    pub fn new(display: &str) -> Self {
        let display = normalize_path(display);
        Self {
            lower: display.to_lowercase(),
            display,
        }
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    pub fn display(&self) -> &str {
        &self.display
    }
}

/// 规范化远程路径：`A/b/` -> `/A/b`，空路径与 `/` 均视为根 ``
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.replace('\\', "/");
    let trimmed = trimmed.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// 远程目录列表中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEntry {
    Folder {
        path: RemotePath,
        name: String,
    },
    File {
        path: RemotePath,
        name: String,
        size: u64,
    },
    /// 已删除的条目（回收站中的记录）
    Deleted {
        path: RemotePath,
        name: String,
    },
    /// 后端返回了无法识别的条目类型
    Unsupported {
        path: RemotePath,
        name: String,
        kind: String,
    },
}

impl RemoteEntry {
    pub fn folder(path: &str) -> Self {
        let path = RemotePath::new(path);
        Self::Folder {
            name: base_name(path.display()),
            path,
        }
    }

    pub fn file(path: &str, size: u64) -> Self {
        let path = RemotePath::new(path);
        Self::File {
            name: base_name(path.display()),
            path,
            size,
        }
    }

    pub fn deleted(path: &str) -> Self {
        let path = RemotePath::new(path);
        Self::Deleted {
            name: base_name(path.display()),
            path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. }
            | Self::File { name, .. }
            | Self::Deleted { name, .. }
            | Self::Unsupported { name, .. } => name,
        }
    }

    pub fn path(&self) -> &RemotePath {
        match self {
            Self::Folder { path, .. }
            | Self::File { path, .. }
            | Self::Deleted { path, .. }
            | Self::Unsupported { path, .. } => path,
        }
    }

    /// 条目类型名称（用于错误信息和 ls 输出）
    pub fn kind(&self) -> &str {
        match self {
            Self::Folder { .. } => "folder",
            Self::File { .. } => "file",
            Self::Deleted { .. } => "deleted",
            Self::Unsupported { kind, .. } => kind,
        }
    }
}

fn base_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// 远程数据源接口
///
/// 实现需要能被多个 worker 并发调用。
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// 列出目录的直接子项，保持后端返回的顺序
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// 读取整个文件
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// 数据源名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建远程数据源
pub fn create_remote(config: &RemoteConfig) -> crate::error::Result<Arc<dyn RemoteSource>> {
    let required = |value: &Option<String>, field: &str| {
        value.clone().ok_or_else(|| {
            MirrorError::Config(format!("{} remote requires {}", config.typ, field))
        })
    };

    let remote = match config.typ {
        RemoteType::Dropbox => {
            let token = required(&config.access_token, "accessToken")?;
            tracing::info!("初始化 Dropbox 数据源: root={:?}", config.root);
            OperatorRemote::dropbox(&token, config.root.as_deref())
        }
        RemoteType::WebDav => {
            let endpoint = required(&config.endpoint, "endpoint")?;
            let username = required(&config.username, "username")?;
            let password = required(&config.password, "password")?;
            tracing::info!("初始化 WebDAV 数据源: endpoint={}, root={:?}", endpoint, config.root);
            OperatorRemote::webdav(&endpoint, &username, &password, config.root.as_deref())
        }
        RemoteType::S3 => {
            let bucket = required(&config.bucket, "bucket")?;
            let region = required(&config.region, "region")?;
            let access_key = required(&config.access_key, "accessKey")?;
            let secret_key = required(&config.secret_key, "secretKey")?;
            tracing::info!("初始化 S3 数据源: bucket={}, region={}", bucket, region);
            OperatorRemote::s3(
                &bucket,
                &region,
                &access_key,
                &secret_key,
                config.endpoint.as_deref(),
                config.root.as_deref(),
            )
        }
        RemoteType::Fs => {
            let root = required(&config.root, "root")?;
            tracing::info!("初始化本地目录数据源: {}", root);
            OperatorRemote::fs(&root)
        }
    }
    .map_err(|e| MirrorError::Config(format!("failed to build {} remote: {}", config.typ, e)))?;

    Ok(Arc::new(remote))
}
