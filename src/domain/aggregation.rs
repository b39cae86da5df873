// ==========================================
// 货代后台系统 - 汇总查询模型
// ==========================================
// 职责: 过滤条件(显式结构体) + 分客户汇总/集装箱列表输出
// 说明: 屏幕展示与 Excel/PDF 导出使用同一输出结构
// ==========================================

use crate::domain::shipment::LoadingItem;
use crate::domain::types::ShipmentStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// NumericRange - 数值区间过滤（闭区间,两端可空）
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn at_least(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

// ==========================================
// SortKey - 分客户排序方式
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortKey {
    /// 客户名升序（忽略大小写）
    #[default]
    ClientName,
    /// 总箱数降序,同箱数按客户名
    TotalCtnDesc,
}

// ==========================================
// AggregateFilters - 汇总过滤条件
// ==========================================
/// 装柜单级过滤: status / date_from / date_to
/// 明细级过滤: search / ctn / weight / cbm
///
/// - search: 对 particular / item_no / 箱唛名做忽略大小写的子串匹配
/// - ctn: 明细箱数区间
/// - weight: 明细总重 (ctn × wt) 区间
/// - cbm: 明细总体积 (ctn × cbm) 区间
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateFilters {
    pub status: Option<ShipmentStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    #[serde(default)]
    pub ctn: NumericRange,
    #[serde(default)]
    pub weight: NumericRange,
    #[serde(default)]
    pub cbm: NumericRange,
    #[serde(default)]
    pub sort: SortKey,
}

impl AggregateFilters {
    /// 规范化后的搜索词（小写,空串视为无）
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    /// 是否存在明细级过滤
    pub fn has_item_filters(&self) -> bool {
        self.search_term().is_some()
            || !self.ctn.is_unbounded()
            || !self.weight.is_unbounded()
            || !self.cbm.is_unbounded()
    }

    /// 是否完全没有过滤
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
            && !self.has_item_filters()
    }
}

// ==========================================
// GroupTotals - 客户小计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupTotals {
    pub ctn: i64,
    pub tpcs: i64,
    pub tcbm: f64,
    pub twt: f64,
    pub item_count: usize,
}

// ==========================================
// ClientGroup - 单个客户(唛头)的分组
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientGroup {
    pub client: String,
    pub sheet_ids: Vec<i64>,
    pub totals: GroupTotals,
    pub items: Vec<LoadingItem>,
}

// ==========================================
// OverallTotals - 集装箱总计
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallTotals {
    pub total_ctn: i64,
    pub total_pcs: i64,
    pub total_cbm: f64,
    pub total_weight: f64,
    pub total_items: usize,
    pub client_count: usize,
}

// ==========================================
// ContainerAggregate - aggregate_container 输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerAggregate {
    pub container_code: String,
    pub origin: String,
    pub per_client: Vec<ClientGroup>,
    pub overall_totals: OverallTotals,
}

// ==========================================
// ContainerSummary - 集装箱看板行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub container_code: String,
    pub origin: String,
    pub latest_status: Option<ShipmentStatus>,
    pub latest_loading_date: Option<NaiveDate>,
    pub total_ctn: i64,
    pub total_pcs: i64,
    pub total_cbm: f64,
    pub total_weight: f64,
    pub client_count: usize,
    pub clients: Vec<String>,
    pub sheet_count: usize,
}

// ==========================================
// Pagination - 偏移分页信息
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: usize) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            ((total as u64 + limit as u64 - 1) / limit as u64) as u32
        };
        Self { page, limit, total, total_pages }
    }

    /// 当前页在完整列表中的起始偏移
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerPage {
    pub containers: Vec<ContainerSummary>,
    pub pagination: Pagination,
}
