// ==========================================
// 智能营销数据平台 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含管道编排逻辑
// ==========================================

pub mod customer;
pub mod import;
pub mod types;

// 重导出核心类型
pub use customer::{Customer, Order};
pub use import::{
    Column, CustomerCandidate, Detection, ImportBatch, ImportResult, ImportSummary, MappedRows,
    MappingResult, OrderCandidate, RowCandidates, RowSkip, SheetData,
};
pub use types::{FieldTag, SkipReason};
