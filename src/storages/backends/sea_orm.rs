use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, TransactionTrait, sea_query::Expr,
};
use tracing::{error, info, warn};

use crate::errors::{Result, ShortlinkError};
use crate::storages::{
    InsertOutcome, LinkRecord, OwnedLink, OwnerListing, Storage, TransactionalImport,
};

use migration::{Migrator, MigratorTrait, entities::link};

#[derive(Clone, Debug)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
}

impl SeaOrmStorage {
    pub async fn new(database_url: &str, backend_name: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(ShortlinkError::database_connection(
                "database_url 未设置".to_string(),
            ));
        }

        // 根据不同数据库类型配置连接选项
        let db = if backend_name == "sqlite" {
            Self::connect_sqlite(database_url).await?
        } else {
            Self::connect_generic(database_url, backend_name).await?
        };

        let storage = SeaOrmStorage {
            db,
            backend_name: backend_name.to_string(),
        };

        // 运行迁移
        storage.run_migrations().await?;

        warn!(
            "{} storage initialized.",
            storage.backend_name.to_uppercase()
        );
        Ok(storage)
    }

    /// 连接 SQLite 数据库（带自动创建和性能优化）
    async fn connect_sqlite(database_url: &str) -> Result<DatabaseConnection> {
        use sea_orm::SqlxSqliteConnector;
        use sea_orm::sqlx::SqlitePool;
        use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
        use std::str::FromStr;

        let opt = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| ShortlinkError::database_connection(format!("SQLite URL 解析失败: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePool::connect_with(opt).await.map_err(|e| {
            ShortlinkError::database_connection(format!("无法连接到 SQLite 数据库: {}", e))
        })?;

        Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
    }

    /// 连接 PostgreSQL
    async fn connect_generic(database_url: &str, backend_name: &str) -> Result<DatabaseConnection> {
        let mut opt = ConnectOptions::new(database_url.to_owned());
        opt.max_connections(100)
            .min_connections(5)
            .connect_timeout(std::time::Duration::from_secs(8))
            .acquire_timeout(std::time::Duration::from_secs(8))
            .sqlx_logging(false);

        Database::connect(opt).await.map_err(|e| {
            ShortlinkError::database_connection(format!(
                "无法连接到 {} 数据库: {}",
                backend_name.to_uppercase(),
                e
            ))
        })
    }

    async fn run_migrations(&self) -> Result<()> {
        Migrator::up(&self.db, None)
            .await
            .map_err(|e| ShortlinkError::database_operation(format!("迁移失败: {}", e)))?;

        info!("Database migrations completed");
        Ok(())
    }

    fn record_to_active_model(record: &LinkRecord) -> link::ActiveModel {
        link::ActiveModel {
            short_url: Set(record.short_url.clone()),
            original_url: Set(record.original_url.clone()),
            owner_id: Set(record.owner_id.clone()),
            deleted: Set(record.deleted),
        }
    }

    /// 判断是否是唯一约束冲突错误
    fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
        use sea_orm::sqlx::Error;

        let sqlx_err = match err {
            sea_orm::DbErr::Exec(sea_orm::RuntimeErr::SqlxError(e)) => e,
            sea_orm::DbErr::Query(sea_orm::RuntimeErr::SqlxError(e)) => e,
            _ => return false,
        };

        match &**sqlx_err {
            Error::Database(db_err) => {
                let code = db_err.code();
                // SQLite: SQLITE_CONSTRAINT_UNIQUE (2067) / SQLITE_CONSTRAINT_PRIMARYKEY (1555)
                // PostgreSQL: unique_violation (23505)
                code.as_ref()
                    .map(|c| c == "2067" || c == "1555" || c == "23505")
                    .unwrap_or(false)
            }
            _ => false,
        }
    }

    async fn find_live_by_url(&self, original_url: &str) -> Result<Option<link::Model>> {
        link::Entity::find()
            .filter(link::Column::OriginalUrl.eq(original_url))
            .filter(link::Column::Deleted.eq(false))
            .one(&self.db)
            .await
            .map_err(|e| {
                ShortlinkError::database_operation(format!("查询 original_url 失败: {}", e))
            })
    }
}

#[async_trait]
impl Storage for SeaOrmStorage {
    async fn insert(&self, record: LinkRecord) -> Result<InsertOutcome> {
        let model = Self::record_to_active_model(&record);

        match link::Entity::insert(model).exec(&self.db).await {
            Ok(_) => {
                info!("Short link created: {}", record.short_url);
                Ok(InsertOutcome::Created(record.short_url))
            }
            Err(e) if Self::is_unique_violation(&e) => {
                // 乐观插入撞上唯一约束：并发插入同一 URL 时也只会有一行存活，
                // 回查已存在记录的短链接码
                match self.find_live_by_url(&record.original_url).await? {
                    Some(existing) => Ok(InsertOutcome::Duplicate(existing.short_url)),
                    // 冲突不在 original_url 上（短链接码主键撞了），原样上抛
                    None => Err(ShortlinkError::database_operation(format!(
                        "插入短链接失败: {}",
                        e
                    ))),
                }
            }
            Err(e) => Err(ShortlinkError::database_operation(format!(
                "插入短链接失败: {}",
                e
            ))),
        }
    }

    async fn lookup(&self, short_url: &str) -> Option<String> {
        let result = link::Entity::find_by_id(short_url).one(&self.db).await;

        match result {
            Ok(Some(model)) if !model.deleted => Some(model.original_url),
            Ok(_) => None,
            Err(e) => {
                error!("查询短链接失败: {}", e);
                None
            }
        }
    }

    async fn exists(&self, original_url: &str) -> bool {
        match self.find_live_by_url(original_url).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                error!("存在性检查失败: {}", e);
                false
            }
        }
    }

    async fn delete_batch(&self, owner_id: &str, short_urls: &[String]) -> Result<u64> {
        if short_urls.is_empty() {
            return Ok(0);
        }

        let result = link::Entity::update_many()
            .col_expr(link::Column::Deleted, Expr::value(true))
            .filter(link::Column::OwnerId.eq(owner_id))
            .filter(link::Column::ShortUrl.is_in(short_urls.iter().map(String::as_str)))
            .filter(link::Column::Deleted.eq(false))
            .exec(&self.db)
            .await
            .map_err(|e| ShortlinkError::database_operation(format!("批量删除失败: {}", e)))?;

        Ok(result.rows_affected)
    }

    async fn get_backend_name(&self) -> String {
        self.backend_name.clone()
    }

    fn as_transactional(&self) -> Option<Arc<dyn TransactionalImport>> {
        Some(Arc::new(self.clone()) as Arc<dyn TransactionalImport>)
    }

    fn as_owner_listing(&self) -> Option<Arc<dyn OwnerListing>> {
        Some(Arc::new(self.clone()) as Arc<dyn OwnerListing>)
    }
}

#[async_trait]
impl TransactionalImport for SeaOrmStorage {
    async fn import_batch(&self, records: Vec<LinkRecord>) -> Result<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| ShortlinkError::database_operation(format!("开始事务失败: {}", e)))?;

        let mut failed: Option<(String, sea_orm::DbErr)> = None;
        for record in &records {
            let model = Self::record_to_active_model(record);
            if let Err(e) = link::Entity::insert(model).exec(&txn).await {
                failed = Some((record.short_url.clone(), e));
                break;
            }
        }

        // 任何一条失败都回滚整批，不留部分导入
        if let Some((code, e)) = failed {
            if let Err(rollback_err) = txn.rollback().await {
                error!("回滚失败: {}", rollback_err);
            }
            return Err(ShortlinkError::database_operation(format!(
                "批量导入失败 ({}): {}",
                code, e
            )));
        }

        txn.commit()
            .await
            .map_err(|e| ShortlinkError::database_operation(format!("提交事务失败: {}", e)))?;

        info!("Imported {} links in one transaction", records.len());
        Ok(())
    }
}

#[async_trait]
impl OwnerListing for SeaOrmStorage {
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<OwnedLink>> {
        let models = link::Entity::find()
            .filter(link::Column::OwnerId.eq(owner_id))
            .filter(link::Column::Deleted.eq(false))
            .all(&self.db)
            .await
            .map_err(|e| ShortlinkError::database_operation(format!("按 owner 查询失败: {}", e)))?;

        Ok(models
            .into_iter()
            .map(|m| OwnedLink {
                short_url: m.short_url,
                original_url: m.original_url,
            })
            .collect())
    }
}
