// ==========================================
// 智能营销数据平台 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 源读取错误 =====
    #[error("数据源不可达: {source_ref}（{detail}。请确认文件存在或共享表已开启\"任何人可查看\"）")]
    SourceUnreachable { source_ref: String, detail: String },

    #[error("数据源为空: {0}（没有任何数据行）")]
    SourceEmpty(String),

    #[error("数据源过大: {rows} 行,超过上限 {cap} 行")]
    SourceTooLarge { rows: usize, cap: usize },

    #[error("源格式不支持: {0}（仅支持 .csv/.xlsx/.xls）")]
    UnsupportedFormat(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    // ===== 并发控制错误 =====
    #[error("组织 {0} 已有导入在执行,请稍后重试")]
    ImportInProgress(String),

    // ===== 归一化错误（单元格级,调用方负责跳过计数）=====
    #[error("单元格归一化失败 (行 {row}, 字段 {field}): {message}")]
    CellNormalizationError {
        row: usize,
        field: String,
        message: String,
    },

    // ===== 数据库错误 =====
    #[error("数据库操作失败: {0}")]
    DatabaseError(String),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<crate::repository::error::RepositoryError> for ImportError {
    fn from(err: crate::repository::error::RepositoryError) -> Self {
        ImportError::DatabaseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
