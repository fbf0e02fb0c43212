use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::errors::{Result, ShortlinkError};
use crate::storages::{InsertOutcome, LinkLine, LinkRecord, Storage};

/// 追加写入的文件存储。文件是唯一事实来源：每次读取都从头顺序扫描，
/// 不维护内存索引；每次追加在返回前 flush + fsync。
/// 软删除以追加一条 deleted 标记行表达，扫描按「同码取最后一条」归并
pub struct FileStorage {
    path: PathBuf,
    // 追加路径单写者串行，读者永远看不到交错的半行
    append_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // 如果不存在就初始化为空文件
        if !path.exists() {
            File::create(&path)?;
        }

        Ok(FileStorage {
            path,
            append_lock: Mutex::new(()),
        })
    }

    /// 从头扫描整个文件，按 short_url 取每条记录的最新状态。
    /// 行尾的损坏或截断记录视作流结束，不是致命错误
    fn scan(&self) -> Result<HashMap<String, LinkLine>> {
        let file = OpenOptions::new().read(true).open(&self.path)?;
        let reader = BufReader::new(file);
        let mut state = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LinkLine>(&line) {
                Ok(rec) => {
                    state.insert(rec.short_url.clone(), rec);
                }
                Err(e) => {
                    warn!("file: trailing unparsable record, treating as end of stream: {}", e);
                    break;
                }
            }
        }

        Ok(state)
    }

    /// 追加一行并立即 flush + fsync，调用方返回时数据已落盘
    fn append_line(&self, line: &LinkLine) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut data = serde_json::to_vec(line)?;
        data.push(b'\n');

        file.write_all(&data)?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn insert(&self, record: LinkRecord) -> Result<InsertOutcome> {
        // 查重和追加在同一把锁内，check-then-append 不会竞争
        let _guard = self.append_lock.lock();

        let state = self.scan()?;

        if let Some(existing) = state
            .values()
            .find(|l| !l.deleted && l.original_url == record.original_url)
        {
            return Ok(InsertOutcome::Duplicate(existing.short_url.clone()));
        }

        // 码已出现过（含已删除的）就拒绝，避免 last-record-wins 复活旧记录
        if state.contains_key(&record.short_url) {
            return Err(ShortlinkError::already_exists(format!(
                "short url already taken: {}",
                record.short_url
            )));
        }

        let code = record.short_url.clone();
        self.append_line(&record.into())?;
        Ok(InsertOutcome::Created(code))
    }

    async fn lookup(&self, short_url: &str) -> Option<String> {
        match self.scan() {
            Ok(state) => state
                .get(short_url)
                .filter(|l| !l.deleted)
                .map(|l| l.original_url.clone()),
            Err(e) => {
                error!("file: scan failed during lookup: {}", e);
                None
            }
        }
    }

    async fn exists(&self, original_url: &str) -> bool {
        match self.scan() {
            Ok(state) => state
                .values()
                .any(|l| !l.deleted && l.original_url == original_url),
            Err(e) => {
                error!("file: scan failed during exists check: {}", e);
                false
            }
        }
    }

    async fn delete_batch(&self, owner_id: &str, short_urls: &[String]) -> Result<u64> {
        let _guard = self.append_lock.lock();

        let state = self.scan()?;
        let mut affected = 0u64;

        for code in short_urls {
            let Some(latest) = state.get(code) else {
                continue;
            };
            // 跨 owner 的删除是静默 no-op；重复删除不再追加墓碑
            if latest.deleted || latest.owner_id != owner_id {
                continue;
            }

            let tombstone = LinkLine {
                short_url: latest.short_url.clone(),
                original_url: latest.original_url.clone(),
                owner_id: latest.owner_id.clone(),
                deleted: true,
            };
            self.append_line(&tombstone)?;
            affected += 1;
        }

        debug!(
            "file: appended {} tombstones for owner '{}' ({} requested)",
            affected,
            owner_id,
            short_urls.len()
        );
        Ok(affected)
    }

    async fn get_backend_name(&self) -> String {
        "file".to_string()
    }
}
