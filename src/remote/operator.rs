use super::{normalize_path, RemoteEntry, RemotePath, RemoteSource};
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use opendal::{layers::TimeoutLayer, EntryMode, Metakey, Operator};
use std::time::Duration;

/// 非 IO 操作超时（秒）- list, stat 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 基于 opendal Operator 的远程数据源
pub struct OperatorRemote {
    operator: Operator,
    name: String,
}

impl OperatorRemote {
    pub fn new(operator: Operator, name: impl Into<String>) -> Self {
        let operator = operator.layer(
            TimeoutLayer::default()
                .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
        );
        Self {
            operator,
            name: name.into(),
        }
    }

    pub fn dropbox(access_token: &str, root: Option<&str>) -> Result<Self> {
        use opendal::services::Dropbox;

        let mut builder = Dropbox::default().access_token(access_token);
        if let Some(r) = root {
            builder = builder.root(r);
        }

        let operator = Operator::new(builder)?.finish();
        let name = format!("dropbox://{}", root.unwrap_or_default().trim_start_matches('/'));
        Ok(Self::new(operator, name))
    }

    pub fn webdav(endpoint: &str, username: &str, password: &str, root: Option<&str>) -> Result<Self> {
        use opendal::services::Webdav;

        let mut builder = Webdav::default()
            .endpoint(endpoint)
            .username(username)
            .password(password);
        if let Some(r) = root {
            builder = builder.root(r);
        }

        let operator = Operator::new(builder)?.finish();
        let name = format!(
            "webdav://{}{}",
            endpoint.trim_end_matches('/'),
            root.map(|r| format!("/{}", r.trim_start_matches('/')))
                .unwrap_or_default()
        );
        Ok(Self::new(operator, name))
    }

    pub fn s3(
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        endpoint: Option<&str>,
        root: Option<&str>,
    ) -> Result<Self> {
        use opendal::services::S3;

        let mut builder = S3::default()
            .bucket(bucket)
            .region(region)
            .access_key_id(access_key)
            .secret_access_key(secret_key);
        if let Some(ep) = endpoint {
            builder = builder.endpoint(ep);
        }
        if let Some(r) = root {
            builder = builder.root(r);
        }

        let operator = Operator::new(builder)?.finish();
        let name = format!(
            "s3://{}{}",
            bucket,
            root.map(|r| format!("/{}", r.trim_start_matches('/')))
                .unwrap_or_default()
        );
        Ok(Self::new(operator, name))
    }

    pub fn fs(root: &str) -> Result<Self> {
        use opendal::services::Fs;

        let operator = Operator::new(Fs::default().root(root))?.finish();
        Ok(Self::new(operator, format!("fs:{}", root)))
    }

    /// `/A/b` -> `A/b/`，根目录 -> `/`
    fn dir_key(path: &str) -> String {
        let normalized = normalize_path(path);
        if normalized.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", normalized.trim_start_matches('/'))
        }
    }

    fn file_key(path: &str) -> String {
        normalize_path(path).trim_start_matches('/').to_string()
    }
}

#[async_trait]
impl RemoteSource for OperatorRemote {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let dir = Self::dir_key(path);
        let mut entries = Vec::new();

        let mut lister = self
            .operator
            .lister_with(&dir)
            .metakey(Metakey::ContentLength | Metakey::Mode)
            .await?;

        while let Some(entry) = lister.try_next().await? {
            let entry_path = entry.path();

            // 跳过目录自身
            if entry_path.is_empty() || entry_path == "/" || entry_path == dir {
                continue;
            }

            let meta = entry.metadata();
            let path = RemotePath::new(entry_path);
            let name = entry.name().trim_end_matches('/').to_string();

            entries.push(match meta.mode() {
                EntryMode::DIR => RemoteEntry::Folder { path, name },
                EntryMode::FILE => RemoteEntry::File {
                    path,
                    name,
                    size: meta.content_length(),
                },
                other => RemoteEntry::Unsupported {
                    path,
                    name,
                    kind: format!("{:?}", other).to_lowercase(),
                },
            });
        }

        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let data = self.operator.read(&Self::file_key(path)).await?;
        Ok(data.to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
