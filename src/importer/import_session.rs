// ==========================================
// 智能营销数据平台 - 导入会话编排器
// ==========================================
// 职责: 串联 preview → commit 管道,维持 org 级单写者纪律
// 流程: 读取 → 识别 → [preview 止步] → 装配 → 合并 → 落库
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{ImportBatch, ImportResult, MappingResult, SheetData};
use crate::importer::error::ImportError;
use crate::importer::merge_engine::MergeEngine;
use crate::importer::sheet_importer_trait::{
    ColumnClassifier, EntityMapper, SheetImporter, SheetSource,
};
use crate::repository::CustomerOrderRepository;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// OrgLockRegistry - org 级互斥锁注册表
// ==========================================
// 单写者纪律: 同一 org 同一时刻至多一个 commit 在执行;
// 第二个并发 commit 快速失败（不排队,重试策略交给调用方）。
// preview 不取锁,可与任何操作并发。
pub struct OrgLockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl OrgLockRegistry {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 进程级全局注册表
    ///
    /// 说明: 分布式部署应换成真正的互斥原语（数据库行锁/分布式锁）,
    /// 进程内互斥是最小正确基线
    pub fn global() -> &'static OrgLockRegistry {
        static REGISTRY: OnceLock<OrgLockRegistry> = OnceLock::new();
        REGISTRY.get_or_init(OrgLockRegistry::new)
    }

    /// 尝试获取 org 锁（非阻塞）
    ///
    /// # 返回
    /// - Some(guard): 获取成功,guard 存活期间持有锁
    /// - None: 该 org 已有导入在执行
    pub fn try_acquire(&self, org_id: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let mut map = self.locks.lock().ok()?;
            map.entry(org_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.try_lock_owned().ok()
    }
}

// ==========================================
// SheetImporterImpl - 导入会话实现
// ==========================================
pub struct SheetImporterImpl<R, C>
where
    R: CustomerOrderRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    repo: R,

    // 配置读取器
    config: C,

    // 管道组件
    source: Box<dyn SheetSource>,
    classifier: Box<dyn ColumnClassifier>,
    mapper: Box<dyn EntityMapper>,
    merge_engine: MergeEngine,

    // org 级锁注册表
    locks: &'static OrgLockRegistry,
}

impl<R, C> SheetImporterImpl<R, C>
where
    R: CustomerOrderRepository,
    C: ImportConfigReader,
{
    /// 创建新的导入会话实例
    ///
    /// # 参数
    /// - repo: 客户/订单仓储
    /// - config: 配置读取器
    /// - source: 源连接器
    /// - classifier: 列分类器
    /// - mapper: 实体装配器
    pub fn new(
        repo: R,
        config: C,
        source: Box<dyn SheetSource>,
        classifier: Box<dyn ColumnClassifier>,
        mapper: Box<dyn EntityMapper>,
    ) -> Self {
        Self {
            repo,
            config,
            source,
            classifier,
            mapper,
            merge_engine: MergeEngine,
            locks: OrgLockRegistry::global(),
        }
    }

    fn config_err(key: &str, e: Box<dyn std::error::Error>) -> ImportError {
        ImportError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        }
    }

    /// 带超时的源读取（挂起点;超时按源不可达处理,不无限阻塞）
    async fn fetch_sheet(&self, source_ref: &str) -> Result<SheetData, ImportError> {
        let max_rows = self
            .config
            .get_max_rows()
            .await
            .map_err(|e| Self::config_err("import/max_rows", e))?;
        let timeout_ms = self
            .config
            .get_fetch_timeout_ms()
            .await
            .map_err(|e| Self::config_err("import/fetch_timeout_ms", e))?;

        match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.source.read(source_ref, max_rows),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ImportError::SourceUnreachable {
                source_ref: source_ref.to_string(),
                detail: format!("读取超时（{} ms）", timeout_ms),
            }),
        }
    }

    async fn classify_sheet(&self, sheet: &SheetData) -> Result<MappingResult, ImportError> {
        let sample_size = self
            .config
            .get_sample_size()
            .await
            .map_err(|e| Self::config_err("import/sample_size", e))?;
        Ok(self.classifier.classify(sheet, sample_size))
    }
}

#[async_trait::async_trait]
impl<R, C> SheetImporter for SheetImporterImpl<R, C>
where
    R: CustomerOrderRepository + Send + Sync,
    C: ImportConfigReader + Send + Sync,
{
    /// 预览（干跑）: 只读操作,不取锁,可重复调用
    #[instrument(skip(self), fields(org_id = %org_id, source_ref = %source_ref))]
    async fn preview(
        &self,
        org_id: &str,
        source_ref: &str,
    ) -> Result<MappingResult, ImportError> {
        debug!("开始预览");
        let sheet = self.fetch_sheet(source_ref).await?;
        let mapping = self.classify_sheet(&sheet).await?;

        info!(
            rows = mapping.row_count,
            columns = mapping.column_count,
            warnings = mapping.warnings.len(),
            "预览完成"
        );
        Ok(mapping)
    }

    /// 提交导入: 完整管道,org 锁内单事务落库
    #[instrument(skip(self), fields(org_id = %org_id, source_ref = %source_ref, batch_id))]
    async fn commit(&self, org_id: &str, source_ref: &str) -> Result<ImportResult, ImportError> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        // === 步骤 0: 取 org 锁（快速失败,不排队）===
        let _guard = self
            .locks
            .try_acquire(org_id)
            .ok_or_else(|| ImportError::ImportInProgress(org_id.to_string()))?;
        info!(batch_id = %batch_id, "开始导入");

        // === 步骤 1: 源读取（带超时）===
        debug!("步骤 1: 源读取");
        let sheet = self.fetch_sheet(source_ref).await?;
        info!(rows = sheet.rows.len(), columns = sheet.header.len(), "源读取完成");

        // === 步骤 2: 列识别 ===
        debug!("步骤 2: 列识别");
        let mapping = self.classify_sheet(&sheet).await?;
        let mut warnings = mapping.warnings.clone();

        // 零命中: 不视为失败,零实体导入 + 告警（由调用方决定下一步）
        if mapping.is_unmapped() {
            warn!("未识别到任何可导入字段,以零计数返回");
            let summary = Default::default();
            let batch = self
                .write_batch_audit(org_id, source_ref, &batch_id, &mapping, &summary, &warnings, start_time)
                .await?;
            return Ok(ImportResult {
                success: true,
                summary,
                message: crate::i18n::t("import.no_fields_detected"),
                warnings,
                batch,
                elapsed_time: start_time.elapsed(),
            });
        }

        // === 步骤 3: 实体装配 + 归一化 ===
        debug!("步骤 3: 实体装配");
        let default_currency = self
            .config
            .get_default_currency(org_id)
            .await
            .map_err(|e| Self::config_err("default_currency", e))?;
        let mapped = self.mapper.map_rows(&sheet, &mapping, &default_currency);

        warnings.extend(mapped.cell_failures.iter().cloned());
        for skip in &mapped.skips {
            warnings.push(format!(
                "行 {} 跳过 ({}): {}",
                skip.row_number, skip.reason, skip.detail
            ));
        }
        info!(
            candidates = mapped.candidates.len(),
            skips = mapped.skips.len(),
            "实体装配完成"
        );

        // === 步骤 4: 去重合并（暂存 → 单事务落库）===
        debug!("步骤 4: 去重合并");
        let summary = self.merge_engine.merge(&self.repo, org_id, &mapped).await?;
        info!(
            customers_imported = summary.customers_imported,
            orders_imported = summary.orders_imported,
            customers_updated = summary.customers_updated,
            orders_skipped = summary.orders_skipped_as_duplicate,
            "合并完成"
        );

        // === 步骤 5: 批次审计 ===
        debug!("步骤 5: 批次审计");
        let batch = self
            .write_batch_audit(org_id, source_ref, &batch_id, &mapping, &summary, &warnings, start_time)
            .await?;

        let message = crate::i18n::t_with_args(
            "import.commit_success",
            &[
                ("customers", &summary.customers_imported.to_string()),
                ("orders", &summary.orders_imported.to_string()),
            ],
        );

        info!(
            batch_id = %batch_id,
            elapsed_ms = start_time.elapsed().as_millis(),
            "导入完成"
        );

        Ok(ImportResult {
            success: true,
            summary,
            message,
            warnings,
            batch,
            elapsed_time: start_time.elapsed(),
        })
    }
}

impl<R, C> SheetImporterImpl<R, C>
where
    R: CustomerOrderRepository,
    C: ImportConfigReader,
{
    /// 写入批次审计记录
    #[allow(clippy::too_many_arguments)]
    async fn write_batch_audit(
        &self,
        org_id: &str,
        source_ref: &str,
        batch_id: &str,
        mapping: &MappingResult,
        summary: &crate::domain::import::ImportSummary,
        warnings: &[String],
        start_time: Instant,
    ) -> Result<ImportBatch, ImportError> {
        let batch = ImportBatch {
            batch_id: batch_id.to_string(),
            org_id: org_id.to_string(),
            source_ref: source_ref.to_string(),
            row_count: mapping.row_count as i64,
            column_count: mapping.column_count as i64,
            customers_imported: summary.customers_imported,
            orders_imported: summary.orders_imported,
            customers_updated: summary.customers_updated,
            orders_skipped: summary.orders_skipped_as_duplicate,
            rows_skipped: summary.rows_skipped,
            imported_at: Utc::now(),
            elapsed_ms: start_time.elapsed().as_millis() as i64,
            warnings_json: serde_json::to_string(warnings).ok(),
        };

        self.repo.insert_import_batch(&batch).await?;
        Ok(batch)
    }
}
