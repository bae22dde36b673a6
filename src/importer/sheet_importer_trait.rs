// ==========================================
// 智能营销数据平台 - 表格导入 Trait
// ==========================================
// 职责: 定义导入管道各组件接口（不包含实现）
// ==========================================

use crate::domain::import::{ImportResult, MappedRows, MappingResult, SheetData};
use crate::domain::types::FieldTag;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

// ==========================================
// SheetSource Trait
// ==========================================
// 用途: 源连接器契约（阶段 0）
// 实现者: CsvFileSource, ExcelFileSource, MemorySource
// 说明: 读取可能涉及慢速 IO,因此是异步挂起点;重复调用幂等
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// 读取源表,返回表头 + 全量数据行
    ///
    /// # 参数
    /// - source_ref: 不透明源引用（文件路径/共享表标识）
    /// - max_rows: 数据行上限（超出返回 SourceTooLarge）
    ///
    /// # 返回
    /// - Ok(SheetData): 表头与数据行
    /// - Err: SourceUnreachable / SourceEmpty / SourceTooLarge / 解析错误
    async fn read(
        &self,
        source_ref: &str,
        max_rows: usize,
    ) -> Result<SheetData, crate::importer::error::ImportError>;
}

// ==========================================
// ColumnClassifier Trait
// ==========================================
// 用途: 列识别接口（阶段 1）
// 实现者: ColumnClassifierImpl
// 红线: 纯函数,只依赖表头与采样窗口,不依赖时钟与行序
pub trait ColumnClassifier: Send + Sync {
    /// 对全部列分类,产出预览结果
    ///
    /// # 参数
    /// - sheet: 源表数据
    /// - sample_size: 采样窗口（每列取前 k 行）
    ///
    /// # 返回
    /// - MappingResult: 每列恰好一个 Detection;从不报错,
    ///   零命中时仅附带告警
    fn classify(&self, sheet: &SheetData, sample_size: usize) -> MappingResult;
}

// ==========================================
// ValueNormalizer Trait
// ==========================================
// 用途: 单元格归一化接口（阶段 2）
// 实现者: ValueNormalizerImpl
pub trait ValueNormalizer: Send + Sync {
    /// 归一化邮箱（小写 + 去空白;必须含 @ 且域名带点）
    fn normalize_email(&self, raw: &str) -> Option<String>;

    /// 归一化电话（去分隔符,保留前导 +;7-15 位数字）
    fn normalize_phone(&self, raw: &str) -> Option<String>;

    /// 解析下单日期（按固定格式清单依序尝试,ISO-8601 优先）
    fn parse_order_date(&self, raw: &str) -> Option<NaiveDate>;

    /// 解析金额（剥离币种符号/千分位;负数仅在退款状态下放行）
    ///
    /// # 参数
    /// - raw: 单元格原文
    /// - refund: 行状态是否为退款类
    fn parse_amount(&self, raw: &str, refund: bool) -> Option<Decimal>;

    /// 解析数量（非负整数,接受 "2.0" 形式;空白缺省 1）
    fn parse_quantity(&self, raw: &str) -> Option<i64>;

    /// 归一化币种（符号/代码表 → ISO-4217 大写;未识别回落默认币种）
    fn normalize_currency(&self, raw: &str, default_currency: &str) -> String;

    /// 归一化状态（去空白、小写、空格转下划线;空白缺省 completed）
    fn normalize_status(&self, raw: &str) -> String;

    /// 判断状态是否属于退款类（放行负金额）
    fn is_refund_status(&self, status: &str) -> bool;
}

// ==========================================
// EntityMapper Trait
// ==========================================
// 用途: 实体装配接口（阶段 3）
// 实现者: EntityMapperImpl
pub trait EntityMapper: Send + Sync {
    /// 按列映射把全量行切成客户/订单候选
    ///
    /// # 参数
    /// - sheet: 源表数据
    /// - mapping: 列识别结果
    /// - default_currency: org 默认币种
    ///
    /// # 返回
    /// - MappedRows: 候选列表（保持行序）+ 跳过清单 + 单元格告警
    fn map_rows(
        &self,
        sheet: &SheetData,
        mapping: &MappingResult,
        default_currency: &str,
    ) -> MappedRows;

    /// 查询某行某字段的原始单元格
    fn cell<'a>(
        &self,
        sheet: &'a SheetData,
        mapping: &MappingResult,
        row_index: usize,
        tag: FieldTag,
    ) -> Option<&'a str>;
}

// ==========================================
// SheetImporter Trait
// ==========================================
// 用途: 导入会话主接口
// 实现者: SheetImporterImpl
#[async_trait]
pub trait SheetImporter: Send + Sync {
    /// 预览（干跑）: 读取 + 列识别,不产生任何写入
    ///
    /// # 说明
    /// 不加锁,可与任意操作并发,可重复调用
    async fn preview(
        &self,
        org_id: &str,
        source_ref: &str,
    ) -> Result<MappingResult, crate::importer::error::ImportError>;

    /// 提交导入: 完整管道,单事务落库
    ///
    /// # 流程（5 个阶段）
    /// 1. 源读取（带超时）
    /// 2. 列识别
    /// 3. 实体装配 + 归一化
    /// 4. 去重合并（读库暂存,内存合并）
    /// 5. 单事务落库 + 批次审计
    ///
    /// # 并发
    /// - 持有 org 级互斥锁;同 org 并发提交快速失败（ImportInProgress）
    ///
    /// # 原子性
    /// - 合并过程任何失败都丢弃全部暂存写入,不产生部分导入
    async fn commit(
        &self,
        org_id: &str,
        source_ref: &str,
    ) -> Result<ImportResult, crate::importer::error::ImportError>;
}
