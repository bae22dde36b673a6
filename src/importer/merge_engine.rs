// ==========================================
// 智能营销数据平台 - 去重合并引擎实现
// ==========================================
// 职责: 管道阶段 4,候选记录对账入库,计算导入计数
// 红线: 唯一触碰共享可变状态的组件;全部写入暂存后
//       单事务应用,失败即整体丢弃
// ==========================================

use crate::domain::customer::{Customer, Order};
use crate::domain::import::{ImportSummary, MappedRows};
use crate::importer::error::ImportError;
use crate::repository::CustomerOrderRepository;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};
use uuid::Uuid;

// ==========================================
// MergeEngine
// ==========================================
// 处理顺序 = 原始行序,保证聚合值对相同输入可复现
pub struct MergeEngine;

impl MergeEngine {
    /// 把装配产物合并进 org 的客户/订单库
    ///
    /// # 流程
    /// 1. 逐行对账: 邮箱查暂存区,未命中再查库
    /// 2. 新邮箱 → 暂存新建（customers_imported）
    ///    既有邮箱 → 只填空合并（customers_updated,每客户计一次）
    /// 3. 订单键判重: 暂存区与库任一命中 → 跳过
    ///    （orders_skipped_as_duplicate）;未命中 → 暂存新建并滚动
    ///    客户聚合
    /// 4. 全部暂存写入单事务落库
    ///
    /// # 前置
    /// - 调用方已持有 org 级互斥锁
    #[instrument(skip(self, repo, mapped), fields(org_id = %org_id))]
    pub async fn merge<R: CustomerOrderRepository>(
        &self,
        repo: &R,
        org_id: &str,
        mapped: &MappedRows,
    ) -> Result<ImportSummary, ImportError> {
        let now = Utc::now();
        let mut summary = ImportSummary {
            rows_skipped: mapped.skips.len() as i64,
            ..Default::default()
        };

        // 暂存区: 保持首次出现顺序,保证落库顺序可复现
        let mut staged_customers: Vec<Customer> = Vec::new();
        let mut customer_index: HashMap<String, usize> = HashMap::new();
        let mut staged_orders: Vec<Order> = Vec::new();
        let mut seen_order_keys: HashSet<String> = HashSet::new();

        for row in &mapped.candidates {
            let candidate = &row.customer;

            // ===== 客户对账 =====
            let idx = match customer_index.get(&candidate.email) {
                Some(&idx) => idx,
                None => {
                    let customer = match repo
                        .find_customer_by_email(org_id, &candidate.email)
                        .await?
                    {
                        Some(existing) => {
                            summary.customers_updated += 1;
                            existing
                        }
                        None => {
                            summary.customers_imported += 1;
                            Customer {
                                customer_id: Customer::deterministic_id(org_id, &candidate.email),
                                org_id: org_id.to_string(),
                                email: candidate.email.clone(),
                                first_name: None,
                                last_name: None,
                                phone: None,
                                city: None,
                                country: None,
                                total_orders: 0,
                                total_revenue: Default::default(),
                                last_order_date: None,
                                created_at: now,
                                updated_at: now,
                            }
                        }
                    };
                    staged_customers.push(customer);
                    let idx = staged_customers.len() - 1;
                    customer_index.insert(candidate.email.clone(), idx);
                    idx
                }
            };

            // 只填空合并: 库中已有值永不被空白候选抹掉
            let changed = staged_customers[idx].fill_missing(
                candidate.first_name.as_deref(),
                candidate.last_name.as_deref(),
                candidate.phone.as_deref(),
                candidate.city.as_deref(),
                candidate.country.as_deref(),
            );
            if changed {
                staged_customers[idx].updated_at = now;
            }

            // ===== 订单对账 =====
            let Some(order_candidate) = &row.order else {
                continue;
            };

            let duplicate = seen_order_keys.contains(&order_candidate.order_key)
                || repo
                    .find_order_by_key(org_id, &order_candidate.order_key)
                    .await?
                    .is_some();

            seen_order_keys.insert(order_candidate.order_key.clone());

            if duplicate {
                summary.orders_skipped_as_duplicate += 1;
                continue;
            }

            staged_orders.push(Order {
                order_id: Uuid::new_v4().to_string(),
                org_id: org_id.to_string(),
                customer_id: staged_customers[idx].customer_id.clone(),
                order_key: order_candidate.order_key.clone(),
                external_id: order_candidate.external_id.clone(),
                order_date: order_candidate.order_date,
                amount: order_candidate.amount,
                currency: order_candidate.currency.clone(),
                product_name: order_candidate.product_name.clone(),
                status: order_candidate.status.clone(),
                quantity: order_candidate.quantity,
                created_at: now,
            });
            summary.orders_imported += 1;

            // 聚合滚动只对新订单发生,重复订单不会二次计入
            staged_customers[idx].roll_in_order(order_candidate.amount, order_candidate.order_date);
            staged_customers[idx].updated_at = now;
        }

        debug!(
            staged_customers = staged_customers.len(),
            staged_orders = staged_orders.len(),
            "暂存完成,开始单事务落库"
        );

        // 单事务应用: 任一失败整体回滚,不产生部分导入
        repo.apply_merge(staged_customers, staged_orders).await?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::{CustomerCandidate, OrderCandidate, RowCandidates};
    use crate::domain::Order as DomainOrder;
    use crate::repository::CustomerOrderRepositoryImpl;
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use std::sync::{Arc, Mutex};

    fn test_repo() -> CustomerOrderRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        CustomerOrderRepositoryImpl::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    fn dec(v: &str) -> Decimal {
        v.parse().unwrap()
    }

    fn candidate_row(email: &str, order_key: Option<&str>, amount: &str) -> RowCandidates {
        let amount = dec(amount);
        RowCandidates {
            customer: CustomerCandidate {
                row_number: 1,
                email: email.to_string(),
                first_name: Some("Ann".to_string()),
                last_name: None,
                phone: None,
                city: None,
                country: None,
            },
            order: Some(OrderCandidate {
                row_number: 1,
                order_key: order_key
                    .map(DomainOrder::explicit_key)
                    .unwrap_or_else(|| DomainOrder::synthetic_key(email, None, &amount)),
                external_id: order_key.map(str::to_string),
                order_date: None,
                amount,
                currency: "USD".to_string(),
                product_name: None,
                status: None,
                quantity: 1,
            }),
        }
    }

    #[tokio::test]
    async fn test_merge_inserts_then_dedups() {
        let repo = test_repo();
        let engine = MergeEngine;

        let mapped = MappedRows {
            candidates: vec![candidate_row("a@x.com", Some("1001"), "42.50")],
            ..Default::default()
        };

        let first = engine.merge(&repo, "org-1", &mapped).await.unwrap();
        assert_eq!(first.customers_imported, 1);
        assert_eq!(first.orders_imported, 1);
        assert_eq!(first.orders_skipped_as_duplicate, 0);

        // 第二次导入同一数据: 客户合并、订单判重
        let second = engine.merge(&repo, "org-1", &mapped).await.unwrap();
        assert_eq!(second.customers_imported, 0);
        assert_eq!(second.customers_updated, 1);
        assert_eq!(second.orders_imported, 0);
        assert_eq!(second.orders_skipped_as_duplicate, 1);

        assert_eq!(repo.count_customers("org-1").await.unwrap(), 1);
        assert_eq!(repo.count_orders("org-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_within_batch_counted_once() {
        let repo = test_repo();
        let engine = MergeEngine;

        let mapped = MappedRows {
            candidates: vec![
                candidate_row("a@x.com", Some("1001"), "42.50"),
                candidate_row("a@x.com", Some("1001"), "42.50"),
            ],
            ..Default::default()
        };

        let summary = engine.merge(&repo, "org-1", &mapped).await.unwrap();
        assert_eq!(summary.customers_imported, 1);
        assert_eq!(summary.orders_imported, 1);
        assert_eq!(summary.orders_skipped_as_duplicate, 1);

        // 聚合只滚动一次
        let customer = repo
            .find_customer_by_email("org-1", "a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.total_orders, 1);
        assert_eq!(customer.total_revenue, dec("42.50"));
    }

    #[tokio::test]
    async fn test_merge_never_erases_populated_field() {
        let repo = test_repo();
        let engine = MergeEngine;

        // 先导入带电话的客户
        let mut with_phone = candidate_row("a@x.com", Some("1001"), "10.00");
        with_phone.customer.phone = Some("+8801711111111".to_string());
        let mapped = MappedRows {
            candidates: vec![with_phone],
            ..Default::default()
        };
        engine.merge(&repo, "org-1", &mapped).await.unwrap();

        // 再导入同邮箱、电话为空的候选
        let mapped = MappedRows {
            candidates: vec![candidate_row("a@x.com", Some("1002"), "20.00")],
            ..Default::default()
        };
        engine.merge(&repo, "org-1", &mapped).await.unwrap();

        let customer = repo
            .find_customer_by_email("org-1", "a@x.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.phone.as_deref(), Some("+8801711111111"));
        assert_eq!(customer.total_orders, 2);
        assert_eq!(customer.total_revenue, dec("30.00"));
    }

    #[tokio::test]
    async fn test_org_isolation() {
        let repo = test_repo();
        let engine = MergeEngine;

        let mapped = MappedRows {
            candidates: vec![candidate_row("a@x.com", Some("1001"), "10.00")],
            ..Default::default()
        };
        engine.merge(&repo, "org-1", &mapped).await.unwrap();
        let summary = engine.merge(&repo, "org-2", &mapped).await.unwrap();

        // 不同 org 互不判重
        assert_eq!(summary.customers_imported, 1);
        assert_eq!(summary.orders_imported, 1);
        assert_eq!(repo.count_customers("org-1").await.unwrap(), 1);
        assert_eq!(repo.count_customers("org-2").await.unwrap(), 1);
    }
}
