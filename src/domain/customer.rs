// ==========================================
// 智能营销数据平台 - 客户/订单领域模型
// ==========================================
// 职责: 定义两类规范实体（Customer / Order）
// 红线: 身份键只用精确归一化值,不做模糊匹配
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// 实体 ID 命名空间: 同一 org + 身份键 永远生成同一 UUID
const ID_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

// ==========================================
// Customer - 客户主数据
// ==========================================
// 用途: 导入层首次见到某邮箱时创建,之后只合并、不替换
// 对齐: customers 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    // ===== 主键与身份 =====
    pub customer_id: String, // 确定性 UUID（org + 归一化邮箱派生）
    pub org_id: String,      // 所属组织
    pub email: String,       // 身份键（已小写 + 去空白）

    // ===== 基础信息 =====
    pub first_name: Option<String>, // 名
    pub last_name: Option<String>,  // 姓
    pub phone: Option<String>,      // 电话（已归一化）
    pub city: Option<String>,       // 城市
    pub country: Option<String>,    // 国家

    // ===== 聚合字段（由合并引擎滚动维护）=====
    pub total_orders: i64,                  // 累计订单数
    pub total_revenue: Decimal,             // 累计消费金额
    pub last_order_date: Option<NaiveDate>, // 最近一次下单日期

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// 由 org + 归一化邮箱派生确定性客户 ID
    ///
    /// # 说明
    /// 重复导入同一邮箱必然得到同一 ID,这是幂等合并的前提
    pub fn deterministic_id(org_id: &str, email: &str) -> String {
        let key = format!("{}:{}", org_id, email);
        Uuid::new_v5(&ID_NAMESPACE, key.as_bytes()).to_string()
    }

    /// 用候选值补齐空白字段（只填空,不覆盖）
    ///
    /// # 规则
    /// - 库中已有值的字段保持不变
    /// - 候选值为 None 时不产生任何影响
    ///
    /// # 返回
    /// - true: 至少有一个字段被补齐
    pub fn fill_missing(
        &mut self,
        first_name: Option<&str>,
        last_name: Option<&str>,
        phone: Option<&str>,
        city: Option<&str>,
        country: Option<&str>,
    ) -> bool {
        let mut changed = false;
        let mut fill = |slot: &mut Option<String>, incoming: Option<&str>| {
            if slot.is_none() {
                if let Some(v) = incoming {
                    if !v.trim().is_empty() {
                        *slot = Some(v.trim().to_string());
                        changed = true;
                    }
                }
            }
        };

        fill(&mut self.first_name, first_name);
        fill(&mut self.last_name, last_name);
        fill(&mut self.phone, phone);
        fill(&mut self.city, city);
        fill(&mut self.country, country);

        changed
    }

    /// 把一笔新订单滚入聚合字段
    pub fn roll_in_order(&mut self, amount: Decimal, order_date: Option<NaiveDate>) {
        self.total_orders += 1;
        self.total_revenue += amount;
        if let Some(d) = order_date {
            self.last_order_date = Some(match self.last_order_date {
                Some(prev) if prev >= d => prev,
                _ => d,
            });
        }
    }
}

// ==========================================
// Order - 订单主数据
// ==========================================
// 用途: 导入层写入;order_key 在 (org, customer) 范围内唯一
// 对齐: orders 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    // ===== 主键与身份 =====
    pub order_id: String,    // 内部 ID（UUID）
    pub org_id: String,      // 所属组织
    pub customer_id: String, // 关联客户（FK）
    pub order_key: String,   // 身份键（归一化订单号 或 合成键）

    // ===== 源字段 =====
    pub external_id: Option<String>, // 源表订单号原文（无订单号列时为 None）
    pub order_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub currency: String, // ISO-4217,未识别时回落 org 默认币种
    pub product_name: Option<String>,
    pub status: Option<String>, // 已小写、空格转下划线
    pub quantity: i64,          // 缺省 1

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// 由归一化订单号派生身份键（org 范围内唯一）
    pub fn explicit_key(external_id: &str) -> String {
        external_id.trim().to_string()
    }

    /// 无订单号列时的合成身份键
    ///
    /// # 组成
    /// - (客户邮箱, 下单日期, 金额) 三元组派生确定性 UUID
    /// - 日期缺失时以空段参与,相同三元组视为同一笔订单（去重而非重复计数）
    pub fn synthetic_key(email: &str, order_date: Option<NaiveDate>, amount: &Decimal) -> String {
        let date_part = order_date.map(|d| d.to_string()).unwrap_or_default();
        // normalize 去掉尾零,"42.5" 与 "42.50" 必须得到同一键
        let key = format!("{}|{}|{}", email, date_part, amount.normalize());
        Uuid::new_v5(&ID_NAMESPACE, key.as_bytes()).to_string()
    }
}
