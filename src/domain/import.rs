// ==========================================
// 智能营销数据平台 - 导入过程领域模型
// ==========================================
// 职责: 定义导入管道各阶段的中间产物与结果结构
// 生命周期: 仅在 preview / commit 流程内
// ==========================================

use crate::domain::types::{FieldTag, SkipReason};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// SheetData - 源表原始数据
// ==========================================
// 用途: 源读取器产物;表头 + 全量数据行,读取后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetData {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    /// 按列切出采样窗口（前 k 行）,供分类器使用
    ///
    /// # 说明
    /// 分类只依赖表头 + 采样窗口,全量行留给实体装配阶段
    pub fn sample_columns(&self, k: usize) -> Vec<Column> {
        self.header
            .iter()
            .enumerate()
            .map(|(index, header)| Column {
                index,
                header: header.clone(),
                sample_values: self
                    .rows
                    .iter()
                    .take(k)
                    .map(|row| row.get(index).cloned().unwrap_or_default())
                    .collect(),
            })
            .collect()
    }
}

// ==========================================
// Column - 源表列
// ==========================================
// 用途: 源读取器产物,读取后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub index: usize,               // 列序号（0 起）
    pub header: String,             // 表头原文
    pub sample_values: Vec<String>, // 采样窗口内的单元格值（≤ sample_size）
}

// ==========================================
// Detection - 列识别结果
// ==========================================
// 每列恰好一个 Detection;field = None 表示忽略该列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub column_index: usize,
    pub field: Option<FieldTag>, // None: 无标签得分超过阈值
    pub confidence: f64,         // [0, 1]
}

// ==========================================
// MappingResult - 预览结果
// ==========================================
// 纯派生数据,无副作用;相同表头+采样必然得到相同结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResult {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<(Column, Detection)>, // 保持原始列序
    pub warnings: Vec<String>,
}

impl MappingResult {
    /// 查找某标签被采用的列序号
    pub fn column_for(&self, tag: FieldTag) -> Option<usize> {
        self.columns
            .iter()
            .find(|(_, d)| d.field == Some(tag))
            .map(|(c, _)| c.index)
    }

    /// 是否没有任何列被识别
    pub fn is_unmapped(&self) -> bool {
        self.columns.iter().all(|(_, d)| d.field.is_none())
    }
}

// ==========================================
// CustomerCandidate - 客户候选记录
// ==========================================
// 用途: 实体装配产物（已归一化）,等待合并引擎落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerCandidate {
    pub row_number: usize, // 源表数据行号（1 起,用于告警定位）
    pub email: String,     // 身份键（已归一化）
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

// ==========================================
// OrderCandidate - 订单候选记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCandidate {
    pub row_number: usize,
    pub order_key: String,           // 身份键（归一化订单号 或 合成键）
    pub external_id: Option<String>, // 源表订单号原文
    pub order_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub currency: String,
    pub product_name: Option<String>,
    pub status: Option<String>,
    pub quantity: i64,
}

// ==========================================
// RowCandidates - 单行装配产物
// ==========================================
// 一行源数据最多贡献一个客户候选和一个订单候选
#[derive(Debug, Clone)]
pub struct RowCandidates {
    pub customer: CustomerCandidate,
    pub order: Option<OrderCandidate>,
}

// ==========================================
// RowSkip - 行跳过记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSkip {
    pub row_number: usize,
    pub reason: SkipReason,
    pub detail: String,
}

// ==========================================
// MappedRows - 实体装配结果
// ==========================================
// 保持原始行序,保证结果计数可复现
#[derive(Debug, Clone, Default)]
pub struct MappedRows {
    pub candidates: Vec<RowCandidates>,
    pub skips: Vec<RowSkip>,
    pub cell_failures: Vec<String>, // 非身份字段归一化失败的告警明细
}

// ==========================================
// ImportBatch - 导入批次审计记录
// ==========================================
// 对齐: import_batch 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String, // 批次 ID（UUID v4）
    pub org_id: String,
    pub source_ref: String, // 不透明源引用（文件路径/共享表标识）
    pub row_count: i64,
    pub column_count: i64,
    pub customers_imported: i64,
    pub orders_imported: i64,
    pub customers_updated: i64,
    pub orders_skipped: i64,
    pub rows_skipped: i64,
    pub imported_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub warnings_json: Option<String>, // 告警明细（JSON 数组）
}

// ==========================================
// ImportSummary - 导入计数汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub customers_imported: i64,          // 新建客户数
    pub orders_imported: i64,             // 新建订单数
    pub customers_updated: i64,           // 合并进既有客户的客户数
    pub orders_skipped_as_duplicate: i64, // 按身份键判重跳过的订单数
    pub rows_skipped: i64,                // 身份字段缺失/非法而整行跳过的行数
}

// ==========================================
// ImportResult - 导入结果
// ==========================================
// 用途: commit 接口返回值;要么全部落库,要么一条不落
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub summary: ImportSummary,
    pub message: String,
    pub warnings: Vec<String>,
    pub batch: ImportBatch,
    pub elapsed_time: std::time::Duration,
}
