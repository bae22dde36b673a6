// ==========================================
// 智能营销数据平台 - 导入层
// ==========================================
// 职责: 外部表格数据导入,生成规范实体
// 流程: 读取 → 列识别 → 装配归一化 → 去重合并 → 落库
// ==========================================

// 模块声明
pub mod column_classifier;
pub mod entity_mapper;
pub mod error;
pub mod import_session;
pub mod merge_engine;
pub mod sheet_importer_trait;
pub mod source_reader;
pub mod value_normalizer;

// 重导出核心类型
pub use column_classifier::ColumnClassifierImpl;
pub use entity_mapper::EntityMapperImpl;
pub use error::{ImportError, ImportResult};
pub use import_session::{OrgLockRegistry, SheetImporterImpl};
pub use merge_engine::MergeEngine;
pub use source_reader::{CsvFileSource, ExcelFileSource, MemorySource, UniversalSource};
pub use value_normalizer::ValueNormalizerImpl;

// 重导出 Trait 接口
pub use sheet_importer_trait::{
    ColumnClassifier, EntityMapper, SheetImporter, SheetSource, ValueNormalizer,
};
