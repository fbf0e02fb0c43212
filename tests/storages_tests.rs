use std::sync::Arc;

use shortlink::storages::backends::file::FileStorage;
use shortlink::storages::backends::memory::MemoryStorage;
use shortlink::storages::backends::sea_orm::SeaOrmStorage;
use shortlink::storages::{InsertOutcome, LinkRecord, Storage};
use tempfile::TempDir;

fn record(code: &str, url: &str, owner: &str) -> LinkRecord {
    LinkRecord::new(code, url, owner)
}

async fn create_temp_sqlite_storage() -> (SeaOrmStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.to_str().unwrap());

    let storage = SeaOrmStorage::new(&url, "sqlite").await.unwrap();
    (storage, temp_dir)
}

fn create_temp_file_storage() -> (FileStorage, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let file_path = temp_dir.path().join("test_links.jsonl");

    let storage = FileStorage::new(&file_path).unwrap();
    (storage, temp_dir)
}

/// 三个后端共享的契约测试：创建、冲突、查询、软删除、重新缩短
async fn storage_contract(storage: &dyn Storage) {
    // 第一次插入成功
    let outcome = storage
        .insert(record("S1code01", "https://example.com/a", "alice"))
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::Created("S1code01".to_string()));

    // 相同 URL 再插一次：不报错，拿回已有的码
    let outcome = storage
        .insert(record("S2code02", "https://example.com/a", "bob"))
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::Duplicate("S1code01".to_string()));
    assert!(outcome.is_duplicate());

    // 查询
    assert_eq!(
        storage.lookup("S1code01").await,
        Some("https://example.com/a".to_string())
    );
    assert_eq!(storage.lookup("S2code02").await, None);
    assert!(storage.exists("https://example.com/a").await);
    assert!(!storage.exists("https://example.com/other").await);

    // owner 匹配才会删除
    let affected = storage
        .delete_batch("alice", &["S1code01".to_string()])
        .await
        .unwrap();
    assert_eq!(affected, 1);

    // 软删除后对查询不可见
    assert_eq!(storage.lookup("S1code01").await, None);
    assert!(!storage.exists("https://example.com/a").await);

    // 同一 URL 现在可以重新缩短，拿到新码
    let outcome = storage
        .insert(record("S3code03", "https://example.com/a", "alice"))
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::Created("S3code03".to_string()));
}

/// 跨 owner 删除是静默 no-op
async fn ownership_isolation(storage: &dyn Storage) {
    storage
        .insert(record("ownBob01", "https://bob.example.com/", "bob"))
        .await
        .unwrap();

    let affected = storage
        .delete_batch("alice", &["ownBob01".to_string()])
        .await
        .unwrap();
    assert_eq!(affected, 0);

    assert_eq!(
        storage.lookup("ownBob01").await,
        Some("https://bob.example.com/".to_string())
    );
}

/// 重复删除同一条记录无害
async fn idempotent_deletion(storage: &dyn Storage) {
    storage
        .insert(record("idem0001", "https://idem.example.com/", "carol"))
        .await
        .unwrap();

    let first = storage
        .delete_batch("carol", &["idem0001".to_string()])
        .await
        .unwrap();
    assert_eq!(first, 1);

    let second = storage
        .delete_batch("carol", &["idem0001".to_string()])
        .await
        .unwrap();
    assert_eq!(second, 0);

    assert_eq!(storage.lookup("idem0001").await, None);
}

#[cfg(test)]
mod memory_storage_tests {
    use super::*;

    #[tokio::test]
    async fn test_contract() {
        let storage = MemoryStorage::new();
        storage_contract(&storage).await;
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let storage = MemoryStorage::new();
        ownership_isolation(&storage).await;
    }

    #[tokio::test]
    async fn test_idempotent_deletion() {
        let storage = MemoryStorage::new();
        idempotent_deletion(&storage).await;
    }

    #[tokio::test]
    async fn test_backend_name() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_backend_name().await, "memory");
    }

    #[tokio::test]
    async fn test_short_url_never_reused() {
        let storage = MemoryStorage::new();
        storage
            .insert(record("reuse001", "https://one.example.com/", ""))
            .await
            .unwrap();

        // 相同的码、不同的 URL：拒绝，不覆盖
        let result = storage
            .insert(record("reuse001", "https://two.example.com/", ""))
            .await;
        assert!(result.is_err());
        assert_eq!(
            storage.lookup("reuse001").await,
            Some("https://one.example.com/".to_string())
        );
    }

    #[tokio::test]
    async fn test_no_capability_extensions() {
        // memory 后端既不支持事务导入也不支持按 owner 列出
        let storage = MemoryStorage::new();
        assert!(storage.as_transactional().is_none());
        assert!(storage.as_owner_listing().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_distinct_urls() {
        let storage = Arc::new(MemoryStorage::new());

        let mut handles = vec![];
        for i in 0..10 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .insert(record(
                        &format!("conc{:04}", i),
                        &format!("https://concurrent{}.example.com/", i),
                        "dave",
                    ))
                    .await
            }));
        }

        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert!(!outcome.is_duplicate());
        }

        for i in 0..10 {
            assert!(storage.lookup(&format!("conc{:04}", i)).await.is_some());
        }
    }
}

#[cfg(test)]
mod file_storage_tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_contract() {
        let (storage, _temp_dir) = create_temp_file_storage();
        storage_contract(&storage).await;
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let (storage, _temp_dir) = create_temp_file_storage();
        ownership_isolation(&storage).await;
    }

    #[tokio::test]
    async fn test_idempotent_deletion() {
        let (storage, _temp_dir) = create_temp_file_storage();
        idempotent_deletion(&storage).await;
    }

    #[tokio::test]
    async fn test_backend_name() {
        let (storage, _temp_dir) = create_temp_file_storage();
        assert_eq!(storage.get_backend_name().await, "file");
    }

    #[tokio::test]
    async fn test_anonymous_live_record_keeps_two_field_layout() {
        let (storage, temp_dir) = create_temp_file_storage();

        storage
            .insert(record("layout01", "https://layout.example.com/", ""))
            .await
            .unwrap();

        // 匿名存活记录的行里只有 short_url / original_url 两个字段
        let content = fs::read_to_string(temp_dir.path().join("test_links.jsonl")).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        let obj = line.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["short_url"], "layout01");
        assert_eq!(obj["original_url"], "https://layout.example.com/");
    }

    #[tokio::test]
    async fn test_reads_legacy_two_field_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("legacy.jsonl");

        fs::write(
            &file_path,
            "{\"short_url\":\"legacy01\",\"original_url\":\"https://legacy.example.com/\"}\n",
        )
        .unwrap();

        let storage = FileStorage::new(&file_path).unwrap();
        assert_eq!(
            storage.lookup("legacy01").await,
            Some("https://legacy.example.com/".to_string())
        );
        assert!(storage.exists("https://legacy.example.com/").await);
    }

    #[tokio::test]
    async fn test_corrupt_trailing_record_is_end_of_stream() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("corrupt.jsonl");

        // 最后一行是被截断的半条记录
        fs::write(
            &file_path,
            "{\"short_url\":\"good0001\",\"original_url\":\"https://good.example.com/\"}\n{\"short_url\":\"bad00",
        )
        .unwrap();

        let storage = FileStorage::new(&file_path).unwrap();
        assert_eq!(
            storage.lookup("good0001").await,
            Some("https://good.example.com/".to_string())
        );
        assert_eq!(storage.lookup("bad00").await, None);
    }

    #[tokio::test]
    async fn test_tombstone_appends_instead_of_rewriting() {
        let (storage, temp_dir) = create_temp_file_storage();

        storage
            .insert(record("tomb0001", "https://tomb.example.com/", "erin"))
            .await
            .unwrap();
        storage
            .delete_batch("erin", &["tomb0001".to_string()])
            .await
            .unwrap();

        // 追加式介质：删除后原始行还在，只是后面多了一条墓碑
        let content = fs::read_to_string(temp_dir.path().join("test_links.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("tomb0001"));
        assert!(lines[1].contains("\"deleted\":true"));

        assert_eq!(storage.lookup("tomb0001").await, None);
    }

    #[tokio::test]
    async fn test_no_capability_extensions() {
        let (storage, _temp_dir) = create_temp_file_storage();
        assert!(storage.as_transactional().is_none());
        assert!(storage.as_owner_listing().is_none());
    }
}

#[cfg(test)]
mod sqlite_storage_tests {
    use super::*;
    use shortlink::storages::OwnedLink;

    #[tokio::test]
    async fn test_contract() {
        let (storage, _temp_dir) = create_temp_sqlite_storage().await;
        storage_contract(&storage).await;
    }

    #[tokio::test]
    async fn test_ownership_isolation() {
        let (storage, _temp_dir) = create_temp_sqlite_storage().await;
        ownership_isolation(&storage).await;
    }

    #[tokio::test]
    async fn test_idempotent_deletion() {
        let (storage, _temp_dir) = create_temp_sqlite_storage().await;
        idempotent_deletion(&storage).await;
    }

    #[tokio::test]
    async fn test_backend_name() {
        let (storage, _temp_dir) = create_temp_sqlite_storage().await;
        assert_eq!(storage.get_backend_name().await, "sqlite");
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_same_url_resolve_to_one_winner() {
        let (storage, _temp_dir) = create_temp_sqlite_storage().await;
        let storage = Arc::new(storage);

        // 并发插入同一 URL：唯一约束保证恰好一条存活，
        // 其余都解析到胜者的码
        let mut handles = vec![];
        for i in 0..8 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .insert(record(
                        &format!("race{:04}", i),
                        "https://race.example.com/",
                        "frank",
                    ))
                    .await
            }));
        }

        let mut created = vec![];
        let mut duplicates = vec![];
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                InsertOutcome::Created(code) => created.push(code),
                InsertOutcome::Duplicate(code) => duplicates.push(code),
            }
        }

        assert_eq!(created.len(), 1);
        assert_eq!(duplicates.len(), 7);
        for code in &duplicates {
            assert_eq!(code, &created[0]);
        }
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let (storage, _temp_dir) = create_temp_sqlite_storage().await;

        for i in 0..3 {
            storage
                .insert(record(
                    &format!("mine{:04}", i),
                    &format!("https://mine{}.example.com/", i),
                    "grace",
                ))
                .await
                .unwrap();
        }
        storage
            .insert(record("their001", "https://theirs.example.com/", "heidi"))
            .await
            .unwrap();

        let listing = storage.as_owner_listing().unwrap();
        let mut links = listing.list_by_owner("grace").await.unwrap();
        links.sort_by(|a, b| a.short_url.cmp(&b.short_url));

        assert_eq!(links.len(), 3);
        assert_eq!(
            links[0],
            OwnedLink {
                short_url: "mine0000".to_string(),
                original_url: "https://mine0.example.com/".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_deleted_links_excluded_from_listing() {
        let (storage, _temp_dir) = create_temp_sqlite_storage().await;

        storage
            .insert(record("listdel1", "https://listdel1.example.com/", "ivan"))
            .await
            .unwrap();
        storage
            .insert(record("listdel2", "https://listdel2.example.com/", "ivan"))
            .await
            .unwrap();
        storage
            .delete_batch("ivan", &["listdel1".to_string()])
            .await
            .unwrap();

        let listing = storage.as_owner_listing().unwrap();
        let links = listing.list_by_owner("ivan").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].short_url, "listdel2");
    }

    #[tokio::test]
    async fn test_capability_extensions_present() {
        let (storage, _temp_dir) = create_temp_sqlite_storage().await;
        assert!(storage.as_transactional().is_some());
        assert!(storage.as_owner_listing().is_some());
    }

    #[tokio::test]
    async fn test_missing_database_url_rejected() {
        let result = SeaOrmStorage::new("", "sqlite").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().is_backend_unavailable());
    }
}

#[cfg(test)]
mod storage_factory_tests {
    use shortlink::config::AppConfig;
    use shortlink::storages::StorageFactory;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_factory_memory_backend() {
        let config = AppConfig::default();
        let storage = StorageFactory::create(&config).await.unwrap();
        assert_eq!(storage.get_backend_name().await, "memory");
    }

    #[tokio::test]
    async fn test_factory_file_backend() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.storage.backend = "file".to_string();
        config.storage.file_path = temp_dir
            .path()
            .join("factory.jsonl")
            .to_str()
            .unwrap()
            .to_string();

        let storage = StorageFactory::create(&config).await.unwrap();
        assert_eq!(storage.get_backend_name().await, "file");
    }

    #[tokio::test]
    async fn test_factory_sqlite_backend() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.storage.backend = "sqlite".to_string();
        config.storage.database_url = format!(
            "sqlite://{}?mode=rwc",
            temp_dir.path().join("factory.db").to_str().unwrap()
        );

        let storage = StorageFactory::create(&config).await.unwrap();
        assert_eq!(storage.get_backend_name().await, "sqlite");
    }

    #[tokio::test]
    async fn test_factory_unknown_backend() {
        let mut config = AppConfig::default();
        config.storage.backend = "etcd".to_string();

        let result = StorageFactory::create(&config).await;
        assert!(result.is_err());
    }
}
