use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::{Result, ShortlinkError};
use crate::storages::{InsertOutcome, LinkRecord, Storage};

/// 进程内存储。单把读写锁护住整个映射：变更串行，读取可并发。
/// 正确性优先，高负载下的锁竞争是接受的限制
pub struct MemoryStorage {
    links: RwLock<HashMap<String, LinkRecord>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            links: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn insert(&self, record: LinkRecord) -> Result<InsertOutcome> {
        let mut links = self.links.write();

        // 查重是 O(n) 线性扫描，预期数据量下可接受，不维护反向索引
        if let Some(existing) = links
            .values()
            .find(|l| !l.deleted && l.original_url == record.original_url)
        {
            return Ok(InsertOutcome::Duplicate(existing.short_url.clone()));
        }

        // 短链接码从不复用，包括已删除的
        if links.contains_key(&record.short_url) {
            return Err(ShortlinkError::already_exists(format!(
                "short url already taken: {}",
                record.short_url
            )));
        }

        let code = record.short_url.clone();
        links.insert(code.clone(), record);
        Ok(InsertOutcome::Created(code))
    }

    async fn lookup(&self, short_url: &str) -> Option<String> {
        let links = self.links.read();
        links
            .get(short_url)
            .filter(|l| !l.deleted)
            .map(|l| l.original_url.clone())
    }

    async fn exists(&self, original_url: &str) -> bool {
        let links = self.links.read();
        links
            .values()
            .any(|l| !l.deleted && l.original_url == original_url)
    }

    async fn delete_batch(&self, owner_id: &str, short_urls: &[String]) -> Result<u64> {
        let mut links = self.links.write();
        let mut affected = 0u64;

        for code in short_urls {
            if let Some(link) = links.get_mut(code) {
                // 跨 owner 的删除是静默 no-op
                if link.owner_id == owner_id && !link.deleted {
                    link.deleted = true;
                    affected += 1;
                }
            }
        }

        debug!(
            "memory: marked {} of {} links deleted for owner '{}'",
            affected,
            short_urls.len(),
            owner_id
        );
        Ok(affected)
    }

    async fn get_backend_name(&self) -> String {
        "memory".to_string()
    }
}
