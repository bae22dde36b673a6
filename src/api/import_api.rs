// ==========================================
// 智能营销数据平台 - 表格导入 API
// ==========================================
// 职责: 封装 preview / commit 两个对外操作,
//       供外围 UI / 网关调用
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager};
use crate::domain::import::ImportBatch;
use crate::domain::types::FieldTag;
use crate::importer::column_classifier::{DEFAULT_HEADER_WEIGHT, DEFAULT_SCORE_THRESHOLD};
use crate::importer::{
    ColumnClassifierImpl, EntityMapperImpl, SheetImporter, SheetImporterImpl, UniversalSource,
};
use crate::repository::{CustomerOrderRepository, CustomerOrderRepositoryImpl};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 预览响应中的单列描述
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewColumn {
    /// 表头原文
    pub name: String,
    /// 识别出的字段标签（None = 忽略）
    pub detected_as: Option<FieldTag>,
    /// 识别置信度 [0, 1]
    pub confidence: f64,
}

/// 预览响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub row_count: usize,
    pub column_count: usize,
    /// 逐列识别结果（保持原始列序）
    pub columns: Vec<PreviewColumn>,
    /// 字段标签 → 被采用的列名
    pub mapping: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    /// 前 3 行原始数据（供前端预览确认）
    pub sample: Vec<Vec<String>>,
}

/// 提交导入响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResponse {
    pub success: bool,
    pub customers_imported: i64,
    pub orders_imported: i64,
    pub customers_updated: i64,
    pub orders_skipped_as_duplicate: i64,
    pub rows_skipped: i64,
    /// 结果说明（面向用户,可解释）
    pub message: String,
    pub warnings: Vec<String>,
    /// 批次 ID（失败时为 None）
    pub batch_id: Option<String>,
    pub elapsed_ms: i64,
}

/// 表格导入 API
pub struct ImportApi {
    db_path: String,
}

impl ImportApi {
    /// 创建新的 ImportApi 实例
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    /// 预览（干跑）
    ///
    /// # 参数
    /// - org_id: 组织
    /// - source_ref: 不透明源引用（文件路径/共享表标识）
    ///
    /// # 返回
    /// - Ok(PreviewResponse): 列识别结果,无任何写入
    /// - Err(ApiError): 源不可达/为空/过大等
    pub async fn preview(&self, org_id: &str, source_ref: &str) -> ApiResult<PreviewResponse> {
        Self::validate_args(org_id, source_ref)?;
        let importer = self.create_importer()?;

        let mapping = importer.preview(org_id, source_ref).await?;

        let columns: Vec<PreviewColumn> = mapping
            .columns
            .iter()
            .map(|(col, det)| PreviewColumn {
                name: col.header.clone(),
                detected_as: det.field,
                confidence: det.confidence,
            })
            .collect();

        // 字段标签 → 列名
        let field_mapping: BTreeMap<String, String> = mapping
            .columns
            .iter()
            .filter_map(|(col, det)| {
                det.field.map(|tag| (tag.to_string(), col.header.clone()))
            })
            .collect();

        // 前 3 行原始数据,由采样窗口重组
        let sample_rows = mapping.row_count.min(3);
        let sample: Vec<Vec<String>> = (0..sample_rows)
            .map(|i| {
                mapping
                    .columns
                    .iter()
                    .map(|(col, _)| col.sample_values.get(i).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(PreviewResponse {
            row_count: mapping.row_count,
            column_count: mapping.column_count,
            columns,
            mapping: field_mapping,
            warnings: mapping.warnings,
            sample,
        })
    }

    /// 提交导入
    ///
    /// # 参数
    /// - org_id: 组织
    /// - source_ref: 不透明源引用
    ///
    /// # 返回
    /// - Ok(CommitResponse): success=true 表示全部落库;
    ///   success=false 表示整体未落库,message 说明原因
    ///   （源不可达/为空/过大/该 org 已有导入在执行）
    /// - Err(ApiError): 参数非法
    pub async fn commit(&self, org_id: &str, source_ref: &str) -> ApiResult<CommitResponse> {
        Self::validate_args(org_id, source_ref)?;
        let importer = self.create_importer()?;

        match importer.commit(org_id, source_ref).await {
            Ok(result) => Ok(CommitResponse {
                success: result.success,
                customers_imported: result.summary.customers_imported,
                orders_imported: result.summary.orders_imported,
                customers_updated: result.summary.customers_updated,
                orders_skipped_as_duplicate: result.summary.orders_skipped_as_duplicate,
                rows_skipped: result.summary.rows_skipped,
                message: result.message,
                warnings: result.warnings,
                batch_id: Some(result.batch.batch_id),
                elapsed_ms: result.elapsed_time.as_millis() as i64,
            }),
            // 整体失败: 一条不落,success=false + 可解释消息
            Err(e) => {
                tracing::warn!(org_id = %org_id, error = %e, "导入整体失败");
                Ok(CommitResponse {
                    success: false,
                    customers_imported: 0,
                    orders_imported: 0,
                    customers_updated: 0,
                    orders_skipped_as_duplicate: 0,
                    rows_skipped: 0,
                    message: e.to_string(),
                    warnings: Vec::new(),
                    batch_id: None,
                    elapsed_ms: 0,
                })
            }
        }
    }

    /// 查询最近的导入批次（审计追溯）
    ///
    /// # 参数
    /// - org_id: 组织
    /// - limit: 返回记录数（1-100）
    pub async fn recent_batches(&self, org_id: &str, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        if org_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("org_id 不能为空".to_string()));
        }
        let limit = limit.clamp(1, 100);

        let repo = CustomerOrderRepositoryImpl::new(&self.db_path)?;
        Ok(repo.recent_import_batches(org_id, limit).await?)
    }

    fn validate_args(org_id: &str, source_ref: &str) -> ApiResult<()> {
        if org_id.trim().is_empty() {
            return Err(ApiError::InvalidInput("org_id 不能为空".to_string()));
        }
        if source_ref.trim().is_empty() {
            return Err(ApiError::InvalidInput("source_ref 不能为空".to_string()));
        }
        Ok(())
    }

    /// 创建导入会话实例
    fn create_importer(
        &self,
    ) -> ApiResult<SheetImporterImpl<CustomerOrderRepositoryImpl, ConfigManager>> {
        let repo = CustomerOrderRepositoryImpl::new(&self.db_path)?;
        let config = ConfigManager::new(&self.db_path)
            .map_err(|e| ApiError::InternalError(format!("创建配置管理器失败: {}", e)))?;

        // 分类参数在构造时读取,管道内的分类器保持纯函数
        let threshold = config
            .get_global_config_value(config_keys::IMPORT_SCORE_THRESHOLD)
            .map_err(|e| ApiError::InternalError(e.to_string()))?
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| (0.0..=1.0).contains(v))
            .unwrap_or(DEFAULT_SCORE_THRESHOLD);
        let header_weight = config
            .get_global_config_value(config_keys::IMPORT_HEADER_WEIGHT)
            .map_err(|e| ApiError::InternalError(e.to_string()))?
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| (0.0..=1.0).contains(v))
            .unwrap_or(DEFAULT_HEADER_WEIGHT);

        Ok(SheetImporterImpl::new(
            repo,
            config,
            Box::new(UniversalSource),
            Box::new(ColumnClassifierImpl::new(threshold, header_weight)),
            Box::new(EntityMapperImpl::new()),
        ))
    }
}
