// ==========================================
// 并发导入测试
// ==========================================
// 测试目标: 验证 org 级单写者纪律与 preview 的无锁并发
// ==========================================


use async_trait::async_trait;
use sheet_importer::config::ConfigManager;
use sheet_importer::domain::SheetData;
use sheet_importer::importer::{
    ColumnClassifierImpl, EntityMapperImpl, ImportError, MemorySource, SheetImporter,
    SheetImporterImpl, SheetSource, UniversalSource,
};
use sheet_importer::logging;
use sheet_importer::repository::{CustomerOrderRepository, CustomerOrderRepositoryImpl};
use test_helpers::create_test_db;

/// 人为放慢的源: 让 commit 在持锁状态下停留足够久,
/// 制造可观察的并发窗口
struct SlowSource {
    inner: MemorySource,
    delay_ms: u64,
}

#[async_trait]
impl SheetSource for SlowSource {
    async fn read(&self, source_ref: &str, max_rows: usize) -> Result<SheetData, ImportError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        self.inner.read(source_ref, max_rows).await
    }
}

fn sample_rows() -> (Vec<String>, Vec<Vec<String>>) {
    (
        vec!["Email".into(), "Order #".into(), "Amount".into()],
        vec![
            vec!["a@x.com".into(), "1001".into(), "10.00".into()],
            vec!["b@x.com".into(), "1002".into(), "20.00".into()],
        ],
    )
}

fn slow_importer(
    db_path: &str,
    delay_ms: u64,
) -> SheetImporterImpl<CustomerOrderRepositoryImpl, ConfigManager> {
    let (header, rows) = sample_rows();
    let repo = CustomerOrderRepositoryImpl::new(db_path).expect("Failed to create repo");
    let config = ConfigManager::new(db_path).expect("Failed to create config");

    SheetImporterImpl::new(
        repo,
        config,
        Box::new(SlowSource {
            inner: MemorySource::new(header, rows),
            delay_ms,
        }),
        Box::new(ColumnClassifierImpl::default()),
        Box::new(EntityMapperImpl::new()),
    )
}

#[tokio::test]
async fn test_concurrent_commits_same_org_fail_fast() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let importer_a = slow_importer(&db_path, 300);
    let importer_b = slow_importer(&db_path, 300);

    let (result_a, result_b) = tokio::join!(
        importer_a.commit("org-conc-same", "mem://sheet"),
        importer_b.commit("org-conc-same", "mem://sheet"),
    );

    // 恰好一个成功、一个因争锁快速失败
    let outcomes = [&result_a, &result_b];
    let ok_count = outcomes.iter().filter(|r| r.is_ok()).count();
    let busy_count = outcomes
        .iter()
        .filter(|r| matches!(r, Err(ImportError::ImportInProgress(_))))
        .count();
    assert_eq!(ok_count, 1, "应恰好一个 commit 成功");
    assert_eq!(busy_count, 1, "另一个 commit 应报 ImportInProgress");

    // 失败方未留下任何部分写入
    let repo = CustomerOrderRepositoryImpl::new(&db_path).unwrap();
    assert_eq!(repo.count_customers("org-conc-same").await.unwrap(), 2);
    assert_eq!(repo.count_orders("org-conc-same").await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_commits_different_orgs_both_succeed() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let importer_a = slow_importer(&db_path, 100);
    let importer_b = slow_importer(&db_path, 100);

    let (result_a, result_b) = tokio::join!(
        importer_a.commit("org-conc-x", "mem://sheet"),
        importer_b.commit("org-conc-y", "mem://sheet"),
    );

    assert!(result_a.is_ok(), "org-conc-x 应成功: {:?}", result_a.err());
    assert!(result_b.is_ok(), "org-conc-y 应成功: {:?}", result_b.err());

    let repo = CustomerOrderRepositoryImpl::new(&db_path).unwrap();
    assert_eq!(repo.count_customers("org-conc-x").await.unwrap(), 2);
    assert_eq!(repo.count_customers("org-conc-y").await.unwrap(), 2);
}

#[tokio::test]
async fn test_preview_runs_during_inflight_commit() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    // 慢 commit 持锁 800ms
    let slow = slow_importer(&db_path, 800);
    let commit_handle = tokio::spawn(async move {
        slow.commit("org-conc-preview", "mem://sheet").await
    });

    // 等 commit 拿到锁后再发 preview
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // preview 不取锁,commit 在途时照常工作
    let fast = {
        let repo = CustomerOrderRepositoryImpl::new(&db_path).unwrap();
        let config = ConfigManager::new(&db_path).unwrap();
        SheetImporterImpl::new(
            repo,
            config,
            Box::new(UniversalSource),
            Box::new(ColumnClassifierImpl::default()),
            Box::new(EntityMapperImpl::new()),
        )
    };
    let preview = fast
        .preview("org-conc-preview", "tests/fixtures/orders_sheet.csv")
        .await;
    assert!(preview.is_ok(), "commit 在途时 preview 应正常返回");

    let commit = commit_handle.await.unwrap();
    assert!(commit.is_ok(), "commit 应正常完成: {:?}", commit.err());
}

#[tokio::test]
async fn test_lock_released_after_commit() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");

    let importer = slow_importer(&db_path, 10);

    // 顺序两次 commit: 第一次释放锁后第二次必须能取到
    let first = importer.commit("org-conc-release", "mem://sheet").await;
    assert!(first.is_ok());

    let second = importer.commit("org-conc-release", "mem://sheet").await;
    assert!(second.is_ok(), "锁应已释放: {:?}", second.err());
    assert_eq!(
        second.unwrap().summary.orders_skipped_as_duplicate,
        2,
        "第二次导入应整单判重"
    );
}
