// ==========================================
// 智能营销数据平台 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 源读取配置 =====

    /// 获取数据行数上限（超出报 SourceTooLarge）
    ///
    /// # 默认值
    /// - 50000
    async fn get_max_rows(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取分类采样窗口（每列取前 k 行参与内容打分）
    ///
    /// # 默认值
    /// - 50
    async fn get_sample_size(&self) -> Result<usize, Box<dyn Error>>;

    /// 获取源读取超时（毫秒,超时报 SourceUnreachable）
    ///
    /// # 默认值
    /// - 15000
    async fn get_fetch_timeout_ms(&self) -> Result<u64, Box<dyn Error>>;

    // ===== 列识别配置 =====

    /// 获取分类接受阈值（综合得分低于该值的列忽略）
    ///
    /// # 默认值
    /// - 0.55
    async fn get_score_threshold(&self) -> Result<f64, Box<dyn Error>>;

    /// 获取表头信号权重（内容信号权重 = 1 - 该值）
    ///
    /// # 默认值
    /// - 0.65
    async fn get_header_weight(&self) -> Result<f64, Box<dyn Error>>;

    // ===== 组织级配置 =====

    /// 获取 org 默认币种（币种列未识别/未命中时回落）
    ///
    /// # 参数
    /// - org_id: 组织（org 级覆写优先,其次 global,最后代码默认值）
    ///
    /// # 默认值
    /// - "USD"
    async fn get_default_currency(&self, org_id: &str) -> Result<String, Box<dyn Error>>;
}
