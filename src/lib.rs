// ==========================================
// 智能营销数据平台 - 表格导入核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 把列名/列序未知的表格数据幂等导入为
//           规范的客户/订单实体
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 管道组件与会话编排
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/schema 引导）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - CLI / 宿主装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    Column, Customer, Detection, FieldTag, ImportSummary, MappingResult, Order, SheetData,
    SkipReason,
};

// 导入层
pub use importer::{
    ColumnClassifier, EntityMapper, SheetImporter, SheetImporterImpl, SheetSource,
    ValueNormalizer,
};

// API
pub use api::{CommitResponse, ImportApi, PreviewResponse};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "智能营销数据平台 - 表格导入";
