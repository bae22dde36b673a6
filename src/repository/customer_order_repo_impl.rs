// ==========================================
// 智能营销数据平台 - 客户/订单 Repository 实现
// ==========================================
// 职责: 实现持久化契约（使用 rusqlite）
// 红线: Repository 不含合并规则,只做数据 CRUD
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::customer::{Customer, Order};
use crate::domain::import::ImportBatch;
use crate::repository::customer_order_repo::CustomerOrderRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row, Transaction};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// TEXT 列 → Decimal（金额以文本存储,避免浮点误差）
fn decimal_from_text(idx: usize, raw: String) -> rusqlite::Result<Decimal> {
    Decimal::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_customer_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        customer_id: row.get(0)?,
        org_id: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone: row.get(5)?,
        city: row.get(6)?,
        country: row.get(7)?,
        total_orders: row.get(8)?,
        total_revenue: decimal_from_text(9, row.get::<_, String>(9)?)?,
        last_order_date: row.get::<_, Option<NaiveDate>>(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn map_order_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        order_id: row.get(0)?,
        org_id: row.get(1)?,
        customer_id: row.get(2)?,
        order_key: row.get(3)?,
        external_id: row.get(4)?,
        order_date: row.get::<_, Option<NaiveDate>>(5)?,
        amount: decimal_from_text(6, row.get::<_, String>(6)?)?,
        currency: row.get(7)?,
        product_name: row.get(8)?,
        status: row.get(9)?,
        quantity: row.get(10)?,
        created_at: row.get(11)?,
    })
}

// ==========================================
// CustomerOrderRepositoryImpl
// ==========================================
pub struct CustomerOrderRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl CustomerOrderRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（连接会再次应用统一 PRAGMA,幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 在事务中 upsert 单个客户（持久化契约的写入原语）
    fn upsert_customer_tx(tx: &Transaction, customer: &Customer) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO customers (
                customer_id, org_id, email, first_name, last_name,
                phone, city, country, total_orders, total_revenue,
                last_order_date, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(org_id, email) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                phone = excluded.phone,
                city = excluded.city,
                country = excluded.country,
                total_orders = excluded.total_orders,
                total_revenue = excluded.total_revenue,
                last_order_date = excluded.last_order_date,
                updated_at = excluded.updated_at
            "#,
            params![
                customer.customer_id,
                customer.org_id,
                customer.email,
                customer.first_name,
                customer.last_name,
                customer.phone,
                customer.city,
                customer.country,
                customer.total_orders,
                customer.total_revenue.to_string(),
                customer.last_order_date,
                customer.created_at,
                customer.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 在事务中插入单笔订单（持久化契约的写入原语）
    fn insert_order_tx(tx: &Transaction, order: &Order) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO orders (
                order_id, org_id, customer_id, order_key, external_id,
                order_date, amount, currency, product_name, status,
                quantity, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                order.order_id,
                order.org_id,
                order.customer_id,
                order.order_key,
                order.external_id,
                order.order_date,
                order.amount.to_string(),
                order.currency,
                order.product_name,
                order.status,
                order.quantity,
                order.created_at,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl CustomerOrderRepository for CustomerOrderRepositoryImpl {
    async fn find_customer_by_email(
        &self,
        org_id: &str,
        email: &str,
    ) -> RepositoryResult<Option<Customer>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let result = conn.query_row(
            r#"
            SELECT customer_id, org_id, email, first_name, last_name,
                   phone, city, country, total_orders, total_revenue,
                   last_order_date, created_at, updated_at
            FROM customers
            WHERE org_id = ?1 AND email = ?2
            "#,
            params![org_id, email],
            map_customer_row,
        );

        match result {
            Ok(customer) => Ok(Some(customer)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_order_by_key(
        &self,
        org_id: &str,
        order_key: &str,
    ) -> RepositoryResult<Option<Order>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let result = conn.query_row(
            r#"
            SELECT order_id, org_id, customer_id, order_key, external_id,
                   order_date, amount, currency, product_name, status,
                   quantity, created_at
            FROM orders
            WHERE org_id = ?1 AND order_key = ?2
            "#,
            params![org_id, order_key],
            map_order_row,
        );

        match result {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 应用一次合并结果（单事务,任一失败整体回滚）
    async fn apply_merge(
        &self,
        customers: Vec<Customer>,
        orders: Vec<Order>,
    ) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        for customer in &customers {
            Self::upsert_customer_tx(&tx, customer)?;
        }
        for order in &orders {
            Self::insert_order_tx(&tx, order)?;
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }

    async fn insert_import_batch(&self, batch: &ImportBatch) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, org_id, source_ref, row_count, column_count,
                customers_imported, orders_imported, customers_updated,
                orders_skipped, rows_skipped, imported_at, elapsed_ms,
                warnings_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                batch.batch_id,
                batch.org_id,
                batch.source_ref,
                batch.row_count,
                batch.column_count,
                batch.customers_imported,
                batch.orders_imported,
                batch.customers_updated,
                batch.orders_skipped,
                batch.rows_skipped,
                batch.imported_at,
                batch.elapsed_ms,
                batch.warnings_json,
            ],
        )?;
        Ok(())
    }

    async fn recent_import_batches(
        &self,
        org_id: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT batch_id, org_id, source_ref, row_count, column_count,
                   customers_imported, orders_imported, customers_updated,
                   orders_skipped, rows_skipped, imported_at, elapsed_ms,
                   warnings_json
            FROM import_batch
            WHERE org_id = ?1
            ORDER BY imported_at DESC
            LIMIT ?2
            "#,
        )?;

        let batches = stmt
            .query_map(params![org_id, limit as i64], |row| {
                Ok(ImportBatch {
                    batch_id: row.get(0)?,
                    org_id: row.get(1)?,
                    source_ref: row.get(2)?,
                    row_count: row.get(3)?,
                    column_count: row.get(4)?,
                    customers_imported: row.get(5)?,
                    orders_imported: row.get(6)?,
                    customers_updated: row.get(7)?,
                    orders_skipped: row.get(8)?,
                    rows_skipped: row.get(9)?,
                    imported_at: row.get::<_, DateTime<Utc>>(10)?,
                    elapsed_ms: row.get(11)?,
                    warnings_json: row.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(batches)
    }

    async fn count_customers(&self, org_id: &str) -> RepositoryResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM customers WHERE org_id = ?1",
            params![org_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    async fn count_orders(&self, org_id: &str) -> RepositoryResult<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE org_id = ?1",
            params![org_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
