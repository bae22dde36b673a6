// ==========================================
// 智能营销数据平台 - 客户/订单 Repository Trait
// ==========================================
// 职责: 定义持久化契约（不包含业务逻辑）
// 红线: Repository 不含合并规则,只做数据 CRUD;
//       全部操作以 org_id 为作用域
// ==========================================

use crate::domain::customer::{Customer, Order};
use crate::domain::import::ImportBatch;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// CustomerOrderRepository Trait
// ==========================================
// 用途: 合并引擎在 org 锁内调用的持久化契约
// 实现者: CustomerOrderRepositoryImpl（rusqlite）
#[async_trait]
pub trait CustomerOrderRepository: Send + Sync {
    // ===== 查询（合并引擎读库暂存用）=====

    /// 按归一化邮箱查客户
    ///
    /// # 参数
    /// - org_id: 组织
    /// - email: 已归一化邮箱（小写 + 去空白）
    ///
    /// # 返回
    /// - Ok(Some(customer)): 已存在
    /// - Ok(None): 未找到
    async fn find_customer_by_email(
        &self,
        org_id: &str,
        email: &str,
    ) -> RepositoryResult<Option<Customer>>;

    /// 按身份键查订单
    ///
    /// # 参数
    /// - org_id: 组织
    /// - order_key: 归一化订单号 或 合成键
    async fn find_order_by_key(
        &self,
        org_id: &str,
        order_key: &str,
    ) -> RepositoryResult<Option<Order>>;

    // ===== 批量写入（事务化）=====

    /// 应用一次合并结果（单事务）
    ///
    /// # 参数
    /// - customers: 暂存客户（新建 + 已合并更新,upsert 语义）
    /// - orders: 暂存订单（仅新建）
    ///
    /// # 返回
    /// - Ok(()): 全部落库
    /// - Err: 任一写入失败,整个事务回滚,库内不可见任何部分写入
    async fn apply_merge(
        &self,
        customers: Vec<Customer>,
        orders: Vec<Order>,
    ) -> RepositoryResult<()>;

    // ===== 批次审计 =====

    /// 插入导入批次记录
    async fn insert_import_batch(&self, batch: &ImportBatch) -> RepositoryResult<()>;

    /// 查询最近的导入批次
    ///
    /// # 参数
    /// - org_id: 组织
    /// - limit: 返回记录数限制
    async fn recent_import_batches(
        &self,
        org_id: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<ImportBatch>>;

    // ===== 统计（测试与汇总用）=====

    /// 统计 org 下客户数
    async fn count_customers(&self, org_id: &str) -> RepositoryResult<usize>;

    /// 统计 org 下订单数
    async fn count_orders(&self, org_id: &str) -> RepositoryResult<usize>;
}
