// ==========================================
// 智能营销数据平台 - 实体装配器实现
// ==========================================
// 职责: 管道阶段 3,按列映射把原始行切成客户/订单候选
// 红线: 身份字段失败的行整行跳过并计数,保持原始行序
// ==========================================

use crate::domain::import::{
    CustomerCandidate, MappedRows, MappingResult, OrderCandidate, RowCandidates, RowSkip,
    SheetData,
};
use crate::domain::types::{FieldTag, SkipReason};
use crate::domain::Order;
use crate::importer::sheet_importer_trait::{EntityMapper, ValueNormalizer};
use crate::importer::value_normalizer::ValueNormalizerImpl;
use tracing::debug;

// ==========================================
// EntityMapperImpl
// ==========================================
pub struct EntityMapperImpl {
    normalizer: ValueNormalizerImpl,
}

impl Default for EntityMapperImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityMapperImpl {
    pub fn new() -> Self {
        Self {
            normalizer: ValueNormalizerImpl::new(),
        }
    }

    /// 拆出名/姓: 显式列优先,否则全名按第一个空格拆
    fn split_name(
        first: Option<&str>,
        last: Option<&str>,
        full: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        let explicit_first = first.map(str::trim).filter(|v| !v.is_empty());
        let explicit_last = last.map(str::trim).filter(|v| !v.is_empty());

        if explicit_first.is_some() || explicit_last.is_some() {
            return (
                explicit_first.map(str::to_string),
                explicit_last.map(str::to_string),
            );
        }

        match full.map(str::trim).filter(|v| !v.is_empty()) {
            Some(full_name) => match full_name.split_once(' ') {
                Some((head, tail)) => (
                    Some(head.to_string()),
                    Some(tail.trim().to_string()),
                ),
                None => (Some(full_name.to_string()), None),
            },
            None => (None, None),
        }
    }
}

impl EntityMapper for EntityMapperImpl {
    fn cell<'a>(
        &self,
        sheet: &'a SheetData,
        mapping: &MappingResult,
        row_index: usize,
        tag: FieldTag,
    ) -> Option<&'a str> {
        let col = mapping.column_for(tag)?;
        let value = sheet.rows.get(row_index)?.get(col)?.trim();
        (!value.is_empty()).then_some(value)
    }

    fn map_rows(
        &self,
        sheet: &SheetData,
        mapping: &MappingResult,
        default_currency: &str,
    ) -> MappedRows {
        let mut result = MappedRows::default();
        let has_order_id_column = mapping.column_for(FieldTag::OrderId).is_some();

        for row_index in 0..sheet.rows.len() {
            let row_number = row_index + 1; // 数据行号,1 起
            let cell = |tag| self.cell(sheet, mapping, row_index, tag);

            // ===== 客户身份: 邮箱 =====
            let email = match cell(FieldTag::Email) {
                None => {
                    result.skips.push(RowSkip {
                        row_number,
                        reason: SkipReason::MissingEmail,
                        detail: "邮箱单元格为空或未识别到邮箱列".to_string(),
                    });
                    continue;
                }
                Some(raw) => match self.normalizer.normalize_email(raw) {
                    Some(email) => email,
                    None => {
                        result.skips.push(RowSkip {
                            row_number,
                            reason: SkipReason::InvalidEmail,
                            detail: format!("邮箱格式非法: {}", raw),
                        });
                        continue;
                    }
                },
            };

            // ===== 客户候选 =====
            let (first_name, last_name) = Self::split_name(
                cell(FieldTag::FirstName),
                cell(FieldTag::LastName),
                cell(FieldTag::FullName),
            );

            let phone = cell(FieldTag::Phone).and_then(|raw| {
                let normalized = self.normalizer.normalize_phone(raw);
                if normalized.is_none() {
                    result
                        .cell_failures
                        .push(format!("行 {}: 电话格式非法,已置空: {}", row_number, raw));
                }
                normalized
            });

            let customer = CustomerCandidate {
                row_number,
                email: email.clone(),
                first_name,
                last_name,
                phone,
                city: cell(FieldTag::City).map(str::to_string),
                country: cell(FieldTag::Country).map(str::to_string),
            };

            // ===== 订单候选 =====
            let status = cell(FieldTag::Status)
                .map(|raw| self.normalizer.normalize_status(raw));
            let refund = status
                .as_deref()
                .map(|s| self.normalizer.is_refund_status(s))
                .unwrap_or(false);

            let order_date = cell(FieldTag::OrderDate).and_then(|raw| {
                let parsed = self.normalizer.parse_order_date(raw);
                if parsed.is_none() {
                    result
                        .cell_failures
                        .push(format!("行 {}: 日期无法解析,已置空: {}", row_number, raw));
                }
                parsed
            });

            let raw_amount = cell(FieldTag::Amount);
            let amount = raw_amount.and_then(|raw| {
                let parsed = self.normalizer.parse_amount(raw, refund);
                if parsed.is_none() {
                    result
                        .cell_failures
                        .push(format!("行 {}: 金额无法解析: {}", row_number, raw));
                }
                parsed
            });

            let external_id = cell(FieldTag::OrderId).map(str::to_string);

            // 订单身份键: 显式订单号优先,否则 (邮箱, 日期, 金额) 合成
            let order = match (&external_id, amount) {
                (Some(id), amount) => Some(OrderCandidate {
                    row_number,
                    order_key: Order::explicit_key(id),
                    external_id: external_id.clone(),
                    order_date,
                    // 身份完整时,金额解析失败降级为 0 并已计入告警
                    amount: amount.unwrap_or_default(),
                    currency: String::new(),
                    product_name: cell(FieldTag::ProductName).map(str::to_string),
                    status: status.clone(),
                    quantity: 1,
                }),
                (None, Some(amount)) => Some(OrderCandidate {
                    row_number,
                    order_key: Order::synthetic_key(&email, order_date, &amount),
                    external_id: None,
                    order_date,
                    amount,
                    currency: String::new(),
                    product_name: cell(FieldTag::ProductName).map(str::to_string),
                    status: status.clone(),
                    quantity: 1,
                }),
                (None, None) => {
                    // 合成身份所需的金额缺失/失败: 订单侧跳过,客户侧照常导入
                    if has_order_id_column || raw_amount.is_some() || order_date.is_some() {
                        result.skips.push(RowSkip {
                            row_number,
                            reason: SkipReason::IncompleteOrderIdentity,
                            detail: "无订单号且金额缺失,无法构成合成订单键".to_string(),
                        });
                    }
                    None
                }
            };

            // 数量与币种在身份确定后填充
            let order = order.map(|mut o| {
                o.quantity = cell(FieldTag::Quantity)
                    .and_then(|raw| {
                        let parsed = self.normalizer.parse_quantity(raw);
                        if parsed.is_none() {
                            result
                                .cell_failures
                                .push(format!("行 {}: 数量非法,按 1 处理: {}", row_number, raw));
                        }
                        parsed
                    })
                    .unwrap_or(1);
                o.currency = self.normalizer.normalize_currency(
                    cell(FieldTag::Currency).unwrap_or_default(),
                    default_currency,
                );
                o
            });

            result.candidates.push(RowCandidates { customer, order });
        }

        debug!(
            candidates = result.candidates.len(),
            skips = result.skips.len(),
            cell_failures = result.cell_failures.len(),
            "实体装配完成"
        );

        result
    }
}
