// ==========================================
// 货代后台系统 - 通用单证模型
// ==========================================
// 分拨 / 仓库计划 / 商业发票 / 装箱单 / 收款表 共享同一结构:
//   父记录(带状态) + 明细集合 + 独立活动日志
// 各模块只需实现 DocumentKind,存储与 API 共用一套泛型实现
// ==========================================

use crate::domain::activity::ActivityVocabulary;
use crate::domain::aggregation::Pagination;
use crate::domain::types::StatusVocabulary;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

// ==========================================
// LineMeasures - 明细可汇总的量
// ==========================================
// cbm / weight 为该明细的总量(已乘箱数),汇总时不再乘
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LineMeasures {
    pub ctn: i64,
    pub pcs: i64,
    pub cbm: f64,
    pub weight: f64,
    pub amount: f64,
}

// ==========================================
// DocumentLine - 明细行约束
// ==========================================
pub trait DocumentLine:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 汇总分组键（客户名 / 唛头 / 品名）
    fn group_key(&self) -> String;

    /// 可汇总的量
    fn measures(&self) -> LineMeasures;

    /// 行级校验,返回错误原因
    fn validate(&self) -> Result<(), String> {
        if self.group_key().trim().is_empty() {
            return Err("分组键不能为空".to_string());
        }
        Ok(())
    }
}

// ==========================================
// DocumentKind - 模块参数
// ==========================================
pub trait DocumentKind: Send + Sync + 'static {
    /// 模块名（日志/错误提示）
    const NAME: &'static str;

    /// 表名前缀: <prefix>_record / <prefix>_line / <prefix>_activity
    const TABLE_PREFIX: &'static str;

    type Status: StatusVocabulary;
    type Activity: ActivityVocabulary;
    type Header: Clone + Debug + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Line: DocumentLine;

    fn record_table() -> String {
        format!("{}_record", Self::TABLE_PREFIX)
    }

    fn line_table() -> String {
        format!("{}_line", Self::TABLE_PREFIX)
    }

    fn activity_table() -> String {
        format!("{}_activity", Self::TABLE_PREFIX)
    }
}

// ==========================================
// LineRecord - 已落库明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRecord<L> {
    pub id: i64,
    pub record_id: i64,
    pub position: i64,
    pub line: L,
}

// ==========================================
// DocumentRecord - 已落库父记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord<S, H, L> {
    pub id: i64,
    pub reference: String,
    pub container_code: Option<String>,
    pub status: S,
    pub header: H,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub lines: Vec<LineRecord<L>>,
}

/// 某模块的父记录类型
pub type RecordOf<K> = DocumentRecord<
    <K as DocumentKind>::Status,
    <K as DocumentKind>::Header,
    <K as DocumentKind>::Line,
>;

/// 写入活动日志的父记录快照（不含明细）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot<S, H> {
    pub record_id: i64,
    pub reference: String,
    pub container_code: Option<String>,
    pub status: S,
    pub header: H,
    pub line_count: usize,
}

impl<S: Copy, H: Clone, L> DocumentRecord<S, H, L> {
    pub fn snapshot(&self) -> RecordSnapshot<S, H> {
        RecordSnapshot {
            record_id: self.id,
            reference: self.reference.clone(),
            container_code: self.container_code.clone(),
            status: self.status,
            header: self.header.clone(),
            line_count: self.lines.len(),
        }
    }
}

// ==========================================
// DocumentFilters - 列表过滤
// ==========================================
/// - search: 对 reference 与明细分组键做忽略大小写的子串匹配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFilters<S> {
    pub status: Option<S>,
    pub container_code: Option<String>,
    pub search: Option<String>,
}

impl<S> Default for DocumentFilters<S> {
    fn default() -> Self {
        Self {
            status: None,
            container_code: None,
            search: None,
        }
    }
}

// ==========================================
// MeasureTotals / DocumentSummary - 单证汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureTotals {
    pub key: String,
    pub line_count: usize,
    pub ctn: i64,
    pub pcs: i64,
    pub cbm: f64,
    pub weight: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub record_id: i64,
    pub reference: String,
    pub groups: Vec<MeasureTotals>,
    pub totals: MeasureTotals,
}

// ==========================================
// RecordPage - 分页结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage<T> {
    pub records: Vec<T>,
    pub pagination: Pagination,
}
