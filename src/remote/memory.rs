//! 测试用的内存数据源：按插入顺序返回列表，可注入失败

use super::{RemoteEntry, RemoteSource};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
pub struct MemoryRemote {
    /// 目录（小写路径）-> 子项，保持插入顺序
    listings: Mutex<HashMap<String, Vec<RemoteEntry>>>,
    /// 文件（小写路径）-> 内容
    contents: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    /// 读取前等待的时长，模拟慢速下载
    read_delays: Mutex<HashMap<String, Duration>>,
    reads: AtomicUsize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, entry: RemoteEntry) {
        let lower = entry.path().lower().to_string();
        let parent = lower.rsplit_once('/').map(|(p, _)| p.to_string()).unwrap_or_default();
        self.listings.lock().unwrap().entry(parent).or_default().push(entry);
    }

    pub fn add_folder(&self, path: &str) -> &Self {
        self.push(RemoteEntry::folder(path));
        self
    }

    pub fn add_file(&self, path: &str, data: &[u8]) -> &Self {
        let entry = RemoteEntry::file(path, data.len() as u64);
        self.contents
            .lock()
            .unwrap()
            .insert(entry.path().lower().to_string(), data.to_vec());
        self.push(entry);
        self
    }

    pub fn add_entry(&self, entry: RemoteEntry) -> &Self {
        self.push(entry);
        self
    }

    /// 之后对该路径的 list / read 都返回错误
    pub fn fail_on(&self, path: &str) -> &Self {
        self.failing.lock().unwrap().insert(path.to_lowercase());
        self
    }

    pub fn delay_read(&self, path: &str, delay: Duration) -> &Self {
        self.read_delays.lock().unwrap().insert(path.to_lowercase(), delay);
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn check(&self, path: &str) -> Result<String> {
        let lower = super::normalize_path(path).to_lowercase();
        if self.failing.lock().unwrap().contains(&lower) {
            return Err(anyhow!("injected failure for {}", path));
        }
        Ok(lower)
    }
}

#[async_trait]
impl RemoteSource for MemoryRemote {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let lower = self.check(path)?;
        // 让出调度，模拟网络调用
        tokio::task::yield_now().await;
        Ok(self
            .listings
            .lock()
            .unwrap()
            .get(&lower)
            .cloned()
            .unwrap_or_default())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let lower = self.check(path)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.read_delays.lock().unwrap().get(&lower).copied();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.contents
            .lock()
            .unwrap()
            .get(&lower)
            .cloned()
            .ok_or_else(|| anyhow!("not found: {}", path))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
