// ==========================================
// 智能营销数据平台 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 配置键常量
pub mod config_keys {
    pub const IMPORT_MAX_ROWS: &str = "import/max_rows";
    pub const IMPORT_SAMPLE_SIZE: &str = "import/sample_size";
    pub const IMPORT_FETCH_TIMEOUT_MS: &str = "import/fetch_timeout_ms";
    pub const IMPORT_SCORE_THRESHOLD: &str = "import/score_threshold";
    pub const IMPORT_HEADER_WEIGHT: &str = "import/header_weight";
    pub const DEFAULT_CURRENCY: &str = "default_currency";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明: 为保证连接行为一致,会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取指定 scope 的配置值
    fn get_scoped_value(&self, scope_id: &str, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
            params![scope_id, key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法,供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_scoped_value("global", key)
    }

    /// 读取 org 覆写值,未配置时回落 global
    pub fn get_org_config_value(
        &self,
        org_id: &str,
        key: &str,
    ) -> Result<Option<String>, Box<dyn Error>> {
        let org_scope = format!("org/{}", org_id);
        if let Some(value) = self.get_scoped_value(&org_scope, key)? {
            return Ok(Some(value));
        }
        self.get_scoped_value("global", key)
    }

    /// 写入配置值（scope 不存在时自动登记）
    ///
    /// # 参数
    /// - scope_id: "global" 或 "org/{org_id}"
    /// - key: 配置键
    /// - value: 配置值
    pub fn set_config_value(
        &self,
        scope_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let scope_type = if scope_id == "global" { "GLOBAL" } else { "ORG" };
        conn.execute(
            r#"
            INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
            VALUES (?1, ?2, ?1)
            "#,
            params![scope_id, scope_type],
        )?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![scope_id, key, value],
        )?;

        Ok(())
    }

    /// 读取 global 配置并解析为指定类型,失败/缺失回落默认值
    fn get_parsed_or<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>> {
        Ok(self
            .get_global_config_value(key)?
            .and_then(|v| v.trim().parse::<T>().ok())
            .unwrap_or(default))
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_max_rows(&self) -> Result<usize, Box<dyn Error>> {
        self.get_parsed_or(config_keys::IMPORT_MAX_ROWS, 50_000)
    }

    async fn get_sample_size(&self) -> Result<usize, Box<dyn Error>> {
        self.get_parsed_or(config_keys::IMPORT_SAMPLE_SIZE, 50)
    }

    async fn get_fetch_timeout_ms(&self) -> Result<u64, Box<dyn Error>> {
        self.get_parsed_or(config_keys::IMPORT_FETCH_TIMEOUT_MS, 15_000)
    }

    async fn get_score_threshold(&self) -> Result<f64, Box<dyn Error>> {
        self.get_parsed_or(config_keys::IMPORT_SCORE_THRESHOLD, 0.55)
    }

    async fn get_header_weight(&self) -> Result<f64, Box<dyn Error>> {
        self.get_parsed_or(config_keys::IMPORT_HEADER_WEIGHT, 0.65)
    }

    async fn get_default_currency(&self, org_id: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_org_config_value(org_id, config_keys::DEFAULT_CURRENCY)?
            .map(|v| v.trim().to_uppercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "USD".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_without_config() {
        let config = test_manager();
        assert_eq!(config.get_max_rows().await.unwrap(), 50_000);
        assert_eq!(config.get_sample_size().await.unwrap(), 50);
        assert_eq!(config.get_score_threshold().await.unwrap(), 0.55);
        assert_eq!(config.get_default_currency("org-1").await.unwrap(), "USD");
    }

    #[tokio::test]
    async fn test_global_override() {
        let config = test_manager();
        config
            .set_config_value("global", config_keys::IMPORT_SAMPLE_SIZE, "10")
            .unwrap();
        assert_eq!(config.get_sample_size().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_org_scope_wins_over_global() {
        let config = test_manager();
        config
            .set_config_value("global", config_keys::DEFAULT_CURRENCY, "USD")
            .unwrap();
        config
            .set_config_value("org/org-1", config_keys::DEFAULT_CURRENCY, "bdt")
            .unwrap();

        assert_eq!(config.get_default_currency("org-1").await.unwrap(), "BDT");
        assert_eq!(config.get_default_currency("org-2").await.unwrap(), "USD");
    }

    #[tokio::test]
    async fn test_malformed_value_falls_back() {
        let config = test_manager();
        config
            .set_config_value("global", config_keys::IMPORT_MAX_ROWS, "not-a-number")
            .unwrap();
        assert_eq!(config.get_max_rows().await.unwrap(), 50_000);
    }
}
