// ==========================================
// 智能营销数据平台 - 单元格归一化实现
// ==========================================
// 职责: 管道阶段 2,按字段标签把原始单元格转成类型化值
// 红线: 身份字段解析失败必须向上暴露,不做静默兜底
// ==========================================

use crate::importer::sheet_importer_trait::ValueNormalizer;
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// 日期格式清单（ISO-8601 优先,其后为常见本地格式,顺序即优先级）
pub const DATE_FORMATS: [&str; 11] = [
    "%Y-%m-%d",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%d %b %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d/%m/%Y %H:%M",
];

/// 已知币种代码（ISO-4217 子集,覆盖平台面向的市场）
const CURRENCY_CODES: [&str; 12] = [
    "USD", "EUR", "GBP", "BDT", "INR", "CNY", "JPY", "AUD", "CAD", "SGD", "AED", "PKR",
];

/// 币种符号 → ISO-4217 代码
const CURRENCY_SYMBOLS: [(&str, &str); 7] = [
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("৳", "BDT"),
    ("₹", "INR"),
    ("¥", "CNY"),
    ("TK", "BDT"),
];

/// 退款类状态（负金额仅在这些状态下放行）
const REFUND_STATUSES: [&str; 4] = ["refunded", "refund", "returned", "chargeback"];

/// 按固定格式清单解析日期（独立函数,分类器的内容打分也用它）
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        // 带时间的格式先按 NaiveDateTime 解,取日期部分
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d);
        }
    }
    None
}

/// 剥离币种符号/代码与千分位后解析十进制金额（独立函数,供内容打分复用）
pub fn parse_amount_str(raw: &str) -> Option<Decimal> {
    let mut value = raw.trim().to_string();
    if value.is_empty() {
        return None;
    }

    // 剥离币种符号与字母（如 "$42.50" / "BDT 1,200" / "Tk500"）
    value = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == ',' || *c == '(' || *c == ')')
        .collect();

    // 会计格式负数: (42.50) → -42.50
    let negative_paren = value.starts_with('(') && value.ends_with(')');
    value = value.replace(['(', ')'], "");

    // 千分位
    value = value.replace(',', "");

    if value.is_empty() || value == "-" {
        return None;
    }

    let mut amount = Decimal::from_str(&value).ok()?;
    if negative_paren {
        amount.set_sign_negative(true);
    }
    Some(amount)
}

/// 判断是否已知币种代码或符号
pub fn is_known_currency(raw: &str) -> bool {
    let upper = raw.trim().to_uppercase();
    CURRENCY_CODES.contains(&upper.as_str())
        || CURRENCY_SYMBOLS.iter().any(|(sym, _)| *sym == upper || *sym == raw.trim())
}

// ==========================================
// ValueNormalizerImpl
// ==========================================
pub struct ValueNormalizerImpl {
    phone_re: Regex,
}

impl Default for ValueNormalizerImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueNormalizerImpl {
    pub fn new() -> Self {
        Self {
            phone_re: Regex::new(r"^\+?\d{7,15}$").expect("固定正则必然合法"),
        }
    }
}

impl ValueNormalizer for ValueNormalizerImpl {
    /// 邮箱: 小写 + 去空白;必须恰好一个 @,域名至少一个点
    fn normalize_email(&self, raw: &str) -> Option<String> {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            return None;
        }

        let mut parts = email.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next()?;

        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
            || email.contains(char::is_whitespace)
        {
            return None;
        }

        Some(email)
    }

    /// 电话: 去掉分隔符,保留前导 +;7-15 位数字
    fn normalize_phone(&self, raw: &str) -> Option<String> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();

        if self.phone_re.is_match(&cleaned) {
            Some(cleaned)
        } else {
            None
        }
    }

    fn parse_order_date(&self, raw: &str) -> Option<NaiveDate> {
        parse_date_str(raw)
    }

    /// 金额: 负数仅在退款状态下放行
    fn parse_amount(&self, raw: &str, refund: bool) -> Option<Decimal> {
        let amount = parse_amount_str(raw)?;
        if amount.is_sign_negative() && !refund {
            return None;
        }
        Some(amount)
    }

    /// 数量: 非负整数;接受 "2.0" 形式;空白由调用方缺省为 1
    fn parse_quantity(&self, raw: &str) -> Option<i64> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }

        if let Ok(n) = value.parse::<i64>() {
            return (n >= 0).then_some(n);
        }

        // "2.0" 形式: 仅接受小数部分全零
        let f = value.parse::<f64>().ok()?;
        if f < 0.0 || f.fract() != 0.0 || f > i64::MAX as f64 {
            return None;
        }
        Some(f as i64)
    }

    /// 币种: 已知代码/符号 → ISO-4217 大写;未识别回落默认币种
    fn normalize_currency(&self, raw: &str, default_currency: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return default_currency.to_string();
        }

        let upper = trimmed.to_uppercase();
        if CURRENCY_CODES.contains(&upper.as_str()) {
            return upper;
        }
        for (sym, code) in CURRENCY_SYMBOLS {
            if sym == upper || sym == trimmed {
                return code.to_string();
            }
        }

        default_currency.to_string()
    }

    /// 状态: 去空白、小写、空格转下划线;空白缺省 completed
    fn normalize_status(&self, raw: &str) -> String {
        let status = raw.trim().to_lowercase().replace(' ', "_");
        if status.is_empty() {
            "completed".to_string()
        } else {
            status
        }
    }

    fn is_refund_status(&self, status: &str) -> bool {
        REFUND_STATUSES.contains(&status.trim().to_lowercase().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> ValueNormalizerImpl {
        ValueNormalizerImpl::new()
    }

    #[test]
    fn test_email_lowercase_trim() {
        let n = normalizer();
        assert_eq!(
            n.normalize_email("  Ann.Lee@Example.COM "),
            Some("ann.lee@example.com".to_string())
        );
    }

    #[test]
    fn test_email_rejects_invalid() {
        let n = normalizer();
        assert_eq!(n.normalize_email("not-an-email"), None);
        assert_eq!(n.normalize_email("a@nodomain"), None);
        assert_eq!(n.normalize_email("a@b@c.com"), None);
        assert_eq!(n.normalize_email(""), None);
        assert_eq!(n.normalize_email("a b@x.com"), None);
    }

    #[test]
    fn test_phone_strips_separators() {
        let n = normalizer();
        assert_eq!(
            n.normalize_phone("+880 1711-111 111"),
            Some("+8801711111111".to_string())
        );
        assert_eq!(n.normalize_phone("(212) 555-0147"), Some("2125550147".to_string()));
    }

    #[test]
    fn test_phone_digit_bounds() {
        let n = normalizer();
        assert_eq!(n.normalize_phone("12345"), None); // 过短
        assert_eq!(n.normalize_phone("1234567890123456"), None); // 过长
        assert_eq!(n.normalize_phone("abc"), None);
    }

    #[test]
    fn test_date_iso_first() {
        let n = normalizer();
        assert_eq!(
            n.parse_order_date("2024-01-05"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(
            n.parse_order_date("2024-01-05T10:30:00"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
    }

    #[test]
    fn test_date_locale_formats() {
        let n = normalizer();
        assert_eq!(
            n.parse_order_date("25/12/2023"),
            NaiveDate::from_ymd_opt(2023, 12, 25)
        );
        assert_eq!(
            n.parse_order_date("Jan 5, 2024"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
        assert_eq!(
            n.parse_order_date("5 Jan 2024"),
            NaiveDate::from_ymd_opt(2024, 1, 5)
        );
    }

    #[test]
    fn test_date_unparseable_fails() {
        // 解析失败必须返回 None,不得兜底为当前时间
        let n = normalizer();
        assert_eq!(n.parse_order_date("next tuesday"), None);
        assert_eq!(n.parse_order_date(""), None);
    }

    #[test]
    fn test_amount_strips_symbols() {
        let n = normalizer();
        let dec = |s: &str| s.parse::<Decimal>().unwrap();
        assert_eq!(n.parse_amount("$42.50", false), Some(dec("42.50")));
        assert_eq!(n.parse_amount("1,234.56", false), Some(dec("1234.56")));
        assert_eq!(n.parse_amount("BDT 1,200", false), Some(dec("1200")));
        assert_eq!(n.parse_amount("৳500", false), Some(dec("500")));
    }

    #[test]
    fn test_amount_negative_needs_refund() {
        let n = normalizer();
        let dec = |s: &str| s.parse::<Decimal>().unwrap();
        assert_eq!(n.parse_amount("-10.00", false), None);
        assert_eq!(n.parse_amount("-10.00", true), Some(dec("-10.00")));
        assert_eq!(n.parse_amount("(10.00)", true), Some(dec("-10.00")));
    }

    #[test]
    fn test_quantity_forms() {
        let n = normalizer();
        assert_eq!(n.parse_quantity("3"), Some(3));
        assert_eq!(n.parse_quantity("2.0"), Some(2));
        assert_eq!(n.parse_quantity("-1"), None);
        assert_eq!(n.parse_quantity("2.5"), None);
        assert_eq!(n.parse_quantity(""), None);
    }

    #[test]
    fn test_currency_table_and_fallback() {
        let n = normalizer();
        assert_eq!(n.normalize_currency("usd", "BDT"), "USD");
        assert_eq!(n.normalize_currency("$", "BDT"), "USD");
        assert_eq!(n.normalize_currency("৳", "USD"), "BDT");
        assert_eq!(n.normalize_currency("doubloons", "BDT"), "BDT");
        assert_eq!(n.normalize_currency("", "BDT"), "BDT");
    }

    #[test]
    fn test_status_normalization() {
        let n = normalizer();
        assert_eq!(n.normalize_status(" Payment Pending "), "payment_pending");
        assert_eq!(n.normalize_status(""), "completed");
        assert!(n.is_refund_status("Refunded"));
        assert!(!n.is_refund_status("completed"));
    }
}
