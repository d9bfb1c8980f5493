//! 共享工作队列与 worker 池
//!
//! 根目录分发把顶层文件夹放入队列，worker 逐个取出并递归遍历。
//! 队列维护未完成计数（入队 +1，完成 -1），`join` 等待计数归零。

use crate::core::engine::{RunReport, SyncEngine};
use crate::error::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// 默认最大 worker 数
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// 可等待排空的 FIFO 队列
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
    outstanding: watch::Sender<usize>,
}

impl WorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (outstanding, _) = watch::channel(0);
        Self {
            tx,
            rx: Mutex::new(rx),
            outstanding,
        }
    }

    /// 入队一个文件夹路径
    pub fn push(&self, path: String) {
        self.outstanding.send_modify(|n| *n += 1);
        // 接收端由队列自身持有，发送不会失败
        let _ = self.tx.send(path);
    }

    /// 阻塞直到取到一项
    pub async fn pop(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }

    /// 标记一项处理完成
    pub fn task_done(&self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// 尚未完成的项数（包括正在处理的）
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// 等待所有已入队的项（包括处理中新入队的）全部完成
    pub async fn join(&self) {
        let mut rx = self.outstanding.subscribe();
        // 发送端由自身持有，wait_for 不会返回错误
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// 有上限的 worker 池
pub struct WorkerPool {
    engine: Arc<SyncEngine>,
    queue: Arc<WorkQueue>,
    max_workers: usize,
    failed_workers: Arc<AtomicU64>,
}

impl WorkerPool {
    pub fn new(engine: Arc<SyncEngine>, queue: Arc<WorkQueue>) -> Self {
        Self {
            engine,
            queue,
            max_workers: DEFAULT_MAX_WORKERS,
            failed_workers: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// 从引擎的根目录开始镜像，等待队列排空后返回报告
    pub async fn run(&self) -> Result<RunReport> {
        let root = self.engine.root().to_string();
        let entries = self.engine.list(&root).await?;

        let n_workers = entries.len().min(self.max_workers);
        info!(
            "根目录 {} 共 {} 项，启动 {} 个 worker",
            if root.is_empty() { "/" } else { &root },
            entries.len(),
            n_workers
        );

        let handles: Vec<JoinHandle<()>> = (0..n_workers).map(|id| self.spawn_worker(id)).collect();

        // 分发失败也要等已入队的文件夹处理完，不中断正在进行的任务
        let dispatched = self.engine.dispatch_root(entries, &self.queue).await;
        if let Err(e) = &dispatched {
            error!("根目录分发失败，等待已入队的文件夹完成: {}", e);
        }
        self.queue.join().await;

        // worker 此时都在等待新任务，直接结束
        for handle in &handles {
            handle.abort();
        }
        dispatched?;

        let mut report = self.engine.report();
        report.failed_workers = self.failed_workers.load(Ordering::Relaxed);
        Ok(report)
    }

    fn spawn_worker(&self, id: usize) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let queue = self.queue.clone();
        let failed_workers = self.failed_workers.clone();

        tokio::spawn(async move {
            while let Some(path) = queue.pop().await {
                // 无论成功与否都标记完成
                let done = scopeguard::guard(queue.clone(), |queue| queue.task_done());
                debug!("worker {} 开始处理 {}", id, path);

                let result = engine.traverse(&path).await;
                drop(done);

                if let Err(e) = result {
                    error!("worker {} 处理 {} 失败，worker 退出: {}", id, path, e);
                    failed_workers.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        })
    }
}
