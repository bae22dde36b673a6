// ==========================================
// 智能营销数据平台 - 领域类型定义
// ==========================================
// 职责: 定义字段词汇表与导入过程的基础枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 字段标签 (Field Tag)
// ==========================================
// 封闭词汇表: 列分类器只能输出这些标签之一
// 序列化格式: snake_case (与外部接口一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTag {
    Email,       // 客户邮箱（客户身份键）
    FirstName,   // 名
    LastName,    // 姓
    FullName,    // 全名（未拆分）
    Phone,       // 电话
    City,        // 城市
    Country,     // 国家
    OrderId,     // 订单号（订单身份键）
    OrderDate,   // 下单日期
    Amount,      // 订单金额
    Currency,    // 币种
    ProductName, // 商品名称
    Status,      // 订单状态
    Quantity,    // 数量
}

impl FieldTag {
    /// 全部标签（用于分类器逐标签打分）
    pub const ALL: [FieldTag; 14] = [
        FieldTag::Email,
        FieldTag::FirstName,
        FieldTag::LastName,
        FieldTag::FullName,
        FieldTag::Phone,
        FieldTag::City,
        FieldTag::Country,
        FieldTag::OrderId,
        FieldTag::OrderDate,
        FieldTag::Amount,
        FieldTag::Currency,
        FieldTag::ProductName,
        FieldTag::Status,
        FieldTag::Quantity,
    ];

    /// 外部接口使用的 snake_case 名称
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldTag::Email => "email",
            FieldTag::FirstName => "first_name",
            FieldTag::LastName => "last_name",
            FieldTag::FullName => "full_name",
            FieldTag::Phone => "phone",
            FieldTag::City => "city",
            FieldTag::Country => "country",
            FieldTag::OrderId => "order_id",
            FieldTag::OrderDate => "order_date",
            FieldTag::Amount => "amount",
            FieldTag::Currency => "currency",
            FieldTag::ProductName => "product_name",
            FieldTag::Status => "status",
            FieldTag::Quantity => "quantity",
        }
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 行跳过原因 (Skip Reason)
// ==========================================
// 身份字段归一化失败的行整行跳过并计数,不做静默兜底
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    MissingEmail,            // 邮箱列缺失或单元格为空
    InvalidEmail,            // 邮箱格式非法
    IncompleteOrderIdentity, // 合成订单键所需字段归一化失败
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingEmail => write!(f, "MISSING_EMAIL"),
            SkipReason::InvalidEmail => write!(f, "INVALID_EMAIL"),
            SkipReason::IncompleteOrderIdentity => write!(f, "INCOMPLETE_ORDER_IDENTITY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_tag_snake_case() {
        assert_eq!(FieldTag::Email.as_str(), "email");
        assert_eq!(FieldTag::OrderDate.as_str(), "order_date");
        assert_eq!(FieldTag::ProductName.to_string(), "product_name");
    }

    #[test]
    fn test_field_tag_serde_roundtrip() {
        let json = serde_json::to_string(&FieldTag::FirstName).unwrap();
        assert_eq!(json, "\"first_name\"");
        let tag: FieldTag = serde_json::from_str(&json).unwrap();
        assert_eq!(tag, FieldTag::FirstName);
    }

    #[test]
    fn test_all_contains_every_tag() {
        assert_eq!(FieldTag::ALL.len(), 14);
    }
}
