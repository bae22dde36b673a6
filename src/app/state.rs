// ==========================================
// 智能营销数据平台 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和 API 实例
// ==========================================

use crate::api::ImportApi;
use std::sync::Arc;

/// 应用状态
///
/// 包含导入 API 实例和共享资源,供 CLI / 嵌入宿主使用
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 表格导入 API
    pub import_api: Arc<ImportApi>,
}

impl AppState {
    /// 创建新的 AppState 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 说明
    /// 打开连接并引导 schema（幂等）,失败返回可读错误
    pub fn new(db_path: String) -> Result<Self, String> {
        let conn = crate::db::open_sqlite_connection(&db_path)
            .map_err(|e| format!("打开数据库失败: {}", e))?;
        crate::db::init_schema(&conn).map_err(|e| format!("初始化 schema 失败: {}", e))?;

        Ok(Self {
            import_api: Arc::new(ImportApi::new(db_path.clone())),
            db_path,
        })
    }
}

/// 获取默认数据库路径
///
/// # 优先级
/// 1. 环境变量 SHEET_IMPORTER_DB_PATH（便于调试/测试/CI）
/// 2. 用户数据目录（开发/生产分目录,避免污染生产数据）
/// 3. 当前目录回退值
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SHEET_IMPORTER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./sheet_importer.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("sheet-importer-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("sheet-importer");
        }

        let _ = std::fs::create_dir_all(&path);
        path = path.join("sheet_importer.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }
}
