use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use crate::config::AppConfig;
use crate::errors::{Result, ShortlinkError};

pub mod backends;
pub mod models;

pub use models::{InsertOutcome, LinkLine, LinkRecord, OwnedLink};

#[async_trait]
pub trait Storage: Send + Sync {
    /// 写入一条记录。相同 original_url 已有未删除记录时不产生新行，
    /// 返回 [`InsertOutcome::Duplicate`] 携带已有的短链接码
    async fn insert(&self, record: LinkRecord) -> Result<InsertOutcome>;

    /// 按短链接码取目标 URL。已软删除的记录视为不存在
    async fn lookup(&self, short_url: &str) -> Option<String>;

    /// original_url 是否已有未删除的记录
    async fn exists(&self, original_url: &str) -> bool;

    /// 将 owner 名下、列表内的记录标记为已删除，返回实际翻转的行数。
    /// 不属于该 owner 的码静默跳过；重复删除无害
    async fn delete_batch(&self, owner_id: &str, short_urls: &[String]) -> Result<u64>;

    async fn get_backend_name(&self) -> String;

    /// 支持把整批导入放进单个事务的后端返回 Some
    fn as_transactional(&self) -> Option<Arc<dyn TransactionalImport>> {
        None
    }

    /// 支持按 owner 列出记录的后端返回 Some
    fn as_owner_listing(&self) -> Option<Arc<dyn OwnerListing>> {
        None
    }
}

#[async_trait]
pub trait TransactionalImport: Send + Sync {
    /// 单个事务内写入整批记录，任一条失败则整批回滚
    async fn import_batch(&self, records: Vec<LinkRecord>) -> Result<()>;
}

#[async_trait]
pub trait OwnerListing: Send + Sync {
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<OwnedLink>>;
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create(config: &AppConfig) -> Result<Arc<dyn Storage>> {
        let backend = config.storage.backend.as_str();

        match backend {
            "memory" => Ok(Arc::new(backends::memory::MemoryStorage::new())),
            "file" => {
                let storage = backends::file::FileStorage::new(&config.storage.file_path)?;
                Ok(Arc::new(storage))
            }
            "sqlite" | "postgres" => {
                let storage =
                    backends::sea_orm::SeaOrmStorage::new(&config.storage.database_url, backend)
                        .await?;
                Ok(Arc::new(storage))
            }
            _ => {
                error!("Unknown storage backend: {}", backend);
                Err(ShortlinkError::storage_plugin_not_found(format!(
                    "Unknown storage backend: {}. Supported: memory, file, sqlite, postgres",
                    backend
                )))
            }
        }
    }
}
