//! Asynchronous bulk deletion
//!
//! A bounded queue feeding a fixed worker pool decouples delete requests
//! from backend mutation. Submission means "accepted", never "applied":
//! apply failures are logged for operators and neither retried nor
//! surfaced to the submitter.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::errors::{Result, ShortlinkError};
use crate::storages::Storage;

/// 一次删除请求：owner + 其名下待删除的短链接码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub owner_id: String,
    pub short_urls: Vec<String>,
}

/// 默认队列容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

pub struct DeletionQueue {
    tx: mpsc::Sender<DeleteRequest>,
    workers: Vec<JoinHandle<()>>,
}

impl DeletionQueue {
    /// 启动工作池并返回队列句柄。`worker_count` 为 0 时按可用 CPU 数取
    pub fn start(storage: Arc<dyn Storage>, capacity: usize, worker_count: usize) -> Self {
        let worker_count = if worker_count == 0 {
            num_cpus::get()
        } else {
            worker_count
        };

        let (tx, rx) = mpsc::channel::<DeleteRequest>(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let rx = Arc::clone(&rx);
            let storage = Arc::clone(&storage);

            workers.push(tokio::spawn(async move {
                loop {
                    // 锁只护住取件，应用删除时已经释放
                    let req = { rx.lock().await.recv().await };
                    let Some(req) = req else {
                        // 通道已关闭且排空
                        break;
                    };

                    match apply(storage.as_ref(), &req).await {
                        Ok(affected) => debug!(
                            "deletion worker {}: {}/{} links marked deleted for owner '{}'",
                            id,
                            affected,
                            req.short_urls.len(),
                            req.owner_id
                        ),
                        Err(e) => {
                            // 提交方早已拿到「已接受」，失败只留给运维看，不重试
                            error!(
                                "deletion worker {}: apply failed for owner '{}': {}",
                                id, req.owner_id, e
                            );
                        }
                    }
                }
                debug!("deletion worker {} exited", id);
            }));
        }

        info!(
            "Deletion queue started: capacity {}, {} workers",
            capacity, worker_count
        );
        DeletionQueue { tx, workers }
    }

    /// 提交删除请求。队列满时阻塞（背压），绝不静默丢弃。
    /// 返回 Ok 表示「已接受」，不表示「已应用」
    pub async fn submit(&self, req: DeleteRequest) -> Result<()> {
        self.tx
            .send(req)
            .await
            .map_err(|_| ShortlinkError::queue_closed("deletion queue is shut down"))
    }

    /// 优雅停机：停止接收新请求，排空已接受的请求，等待工作者退出
    pub async fn shutdown(self) {
        drop(self.tx);

        for handle in self.workers {
            if let Err(e) = handle.await {
                error!("deletion worker panicked: {}", e);
            }
        }

        info!("Deletion queue drained and stopped");
    }
}

async fn apply(storage: &dyn Storage, req: &DeleteRequest) -> anyhow::Result<u64> {
    let affected = storage.delete_batch(&req.owner_id, &req.short_urls).await?;
    Ok(affected)
}
