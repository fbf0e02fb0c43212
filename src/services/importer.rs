//! Batch import service
//!
//! Assigns a fresh short code to every submitted URL and persists the
//! batch: inside one transaction when the backend supports it, per-item
//! best-effort otherwise.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::{Result, ShortlinkError};
use crate::storages::{InsertOutcome, LinkRecord, Storage, TransactionalImport};
use crate::utils::url_validator::validate_url;
use crate::utils::{DEFAULT_CODE_LENGTH, generate_random_code};

/// 批量导入的输入项：调用方自带的关联标识 + 原始 URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// 与输入同序的输出项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchOutcome {
    pub correlation_id: String,
    pub short_url: String,
}

/// 短链接码生成器。码的来源是外部协作方，碰撞处理归存储层
pub type CodeGenerator = fn(usize) -> String;

pub struct BatchImporter {
    storage: Arc<dyn Storage>,
    generate_code: CodeGenerator,
    code_length: usize,
}

impl BatchImporter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        BatchImporter {
            storage,
            generate_code: generate_random_code,
            code_length: DEFAULT_CODE_LENGTH,
        }
    }

    pub fn with_generator(
        storage: Arc<dyn Storage>,
        generate_code: CodeGenerator,
        code_length: usize,
    ) -> Self {
        BatchImporter {
            storage,
            generate_code,
            code_length,
        }
    }

    /// 导入一批 URL，为每条分配新码。
    /// 输出与输入同序，correlation_id 一一对应
    pub async fn import(&self, items: Vec<BatchItem>, owner_id: &str) -> Result<Vec<BatchOutcome>> {
        // 坏载荷在任何后端调用之前拒绝
        if items.is_empty() {
            return Err(ShortlinkError::validation("batch is empty"));
        }
        for item in &items {
            validate_url(&item.original_url).map_err(|e| {
                ShortlinkError::validation(format!(
                    "invalid url for '{}': {}",
                    item.correlation_id, e
                ))
            })?;
        }

        // 严格预检：批内任何 URL 已有存活记录则整批拒绝，不做任何写入
        for item in &items {
            if self.storage.exists(&item.original_url).await {
                return Err(ShortlinkError::already_exists(format!(
                    "url already shortened: {}",
                    item.original_url
                )));
            }
        }

        match self.storage.as_transactional() {
            Some(txn) => self.import_transactional(txn, items, owner_id).await,
            None => self.import_best_effort(items, owner_id).await,
        }
    }

    /// 事务介质：整批进一个事务，任一条失败全部回滚
    async fn import_transactional(
        &self,
        txn: Arc<dyn TransactionalImport>,
        items: Vec<BatchItem>,
        owner_id: &str,
    ) -> Result<Vec<BatchOutcome>> {
        let mut records = Vec::with_capacity(items.len());
        let mut out = Vec::with_capacity(items.len());

        for item in items {
            let code = (self.generate_code)(self.code_length);
            records.push(LinkRecord::new(
                code.clone(),
                item.original_url.clone(),
                owner_id,
            ));
            out.push(BatchOutcome {
                correlation_id: item.correlation_id,
                short_url: code,
            });
        }

        txn.import_batch(records).await?;

        info!("Imported batch of {} links", out.len());
        Ok(out)
    }

    /// 无事务介质：逐条写入，单条失败不阻塞后续条目
    async fn import_best_effort(
        &self,
        items: Vec<BatchItem>,
        owner_id: &str,
    ) -> Result<Vec<BatchOutcome>> {
        let mut out = Vec::with_capacity(items.len());

        for item in items {
            let code = (self.generate_code)(self.code_length);
            let record = LinkRecord::new(code.clone(), item.original_url.clone(), owner_id);

            let short_url = match self.storage.insert(record).await {
                Ok(InsertOutcome::Created(code)) => code,
                // 预检之后才出现的重复（批内重复或并发写入），按冲突协议
                // 解析到已存在的码
                Ok(InsertOutcome::Duplicate(existing)) => existing,
                Err(e) => {
                    error!("batch item '{}' failed: {}", item.correlation_id, e);
                    code
                }
            };

            out.push(BatchOutcome {
                correlation_id: item.correlation_id,
                short_url,
            });
        }

        Ok(out)
    }
}
