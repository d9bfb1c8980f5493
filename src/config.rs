//! 应用配置模块

use crate::error::{MirrorError, Result};
use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件名（位于运行目录）
pub const CONFIG_FILE: &str = "mirror.json";

/// 远程数据源类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteType {
    #[default]
    Dropbox,
    WebDav,
    S3,
    Fs,
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteType::Dropbox => write!(f, "dropbox"),
            RemoteType::WebDav => write!(f, "webdav"),
            RemoteType::S3 => write!(f, "s3"),
            RemoteType::Fs => write!(f, "fs"),
        }
    }
}

/// 远程数据源配置，各字段按类型选用
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(rename = "type")]
    pub typ: RemoteType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

/// 镜像任务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorConfig {
    pub remote: RemoteConfig,
    /// 本地目标根目录
    pub dest_dir: PathBuf,
    /// 只同步这些顶层名称（空表示全部）
    #[serde(default)]
    pub restrict_to: Vec<String>,
    /// 是否过滤构建产物、.git 与已删除文件
    #[serde(default)]
    pub skip_noise: bool,
    /// 最大 worker 数
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_max_workers() -> usize {
    crate::core::DEFAULT_MAX_WORKERS
}

impl MirrorConfig {
    /// 从运行目录加载 `mirror.json`
    pub fn load(base_dir: &Path) -> Result<Self> {
        Self::load_file(&base_dir.join(CONFIG_FILE))
    }

    pub fn load_file(config_file: &Path) -> Result<Self> {
        if !config_file.exists() {
            return Err(MirrorError::Config(format!(
                "config file not found: {}; run from the directory containing {}",
                config_file.display(),
                CONFIG_FILE
            )));
        }

        let content = fs::read_to_string(config_file)
            .map_err(|e| MirrorError::Config(format!("cannot read {}: {}", config_file.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: MirrorConfig = serde_json::from_str(content)
            .map_err(|e| MirrorError::Config(format!("invalid {}: {}", CONFIG_FILE, e)))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.restrict_to = self
            .restrict_to
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }

    fn validate(&self) -> Result<()> {
        if self.dest_dir.as_os_str().is_empty() {
            return Err(MirrorError::Config("destDir must not be empty".to_string()));
        }
        if self.max_workers == 0 {
            return Err(MirrorError::Config("maxWorkers must be at least 1".to_string()));
        }
        Ok(())
    }
}
