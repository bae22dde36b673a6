// ==========================================
// 智能营销数据平台 - 应用层
// ==========================================
// 职责: 应用装配,连接 CLI / 宿主与核心库
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
