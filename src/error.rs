//! 错误类型

use std::path::PathBuf;
use thiserror::Error;

/// 镜像过程中可能出现的错误
///
/// 跳过（过滤规则命中）不是错误，只会记录到 skipped.log。
#[derive(Error, Debug)]
pub enum MirrorError {
    /// 配置缺失或无效，在开始遍历之前即失败
    #[error("Configuration error: {0}")]
    Config(String),

    /// 远程列目录 / 读取失败
    #[error("Remote transport error at {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: anyhow::Error,
    },

    /// 本地创建目录 / 写文件失败
    #[error("Local IO error at {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 列表结果不属于 Folder / File / Deleted
    #[error("Unexpected folder entry at {path}: {kind} (expected folder, file or deleted)")]
    UnexpectedEntry { path: String, kind: String },
}

impl MirrorError {
    pub fn transport(path: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Transport {
            path: path.into(),
            source,
        }
    }

    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
