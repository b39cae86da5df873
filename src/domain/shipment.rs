// ==========================================
// 货代后台系统 - 装柜领域模型
// ==========================================
// 实体: Container / ShippingMark / CtnMark / LoadingSheet / LoadingItem
// 红线: t 前缀字段(tpcs/tcbm/twt)一律在写入时由 ctn × 单件值 重算
// ==========================================

use crate::domain::types::ShipmentStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Container - 集装箱
// ==========================================
// 业务键: code (唯一); origin 首次创建后不再覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: i64,
    pub code: String,
    pub origin: String,
    pub created_at: NaiveDateTime,
}

// ==========================================
// ShippingMark - 客户唛头
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingMark {
    pub id: i64,
    pub name: String,
    pub source: Option<String>,
}

// ==========================================
// CtnMark - 箱唛
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CtnMark {
    pub id: i64,
    pub name: String,
}

// ==========================================
// User - 操作人
// ==========================================
// 由认证层提供,核心只把 id 当作不透明引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub role: Option<String>,
}

// ==========================================
// LoadingSheet - 装柜单
// ==========================================
// 同一 (container, shipping mark) 可以有多张装柜单,各自独立
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingSheet {
    pub id: i64,
    pub container_id: i64,
    pub container_code: String,
    pub shipping_mark_id: i64,
    pub shipping_mark: String,
    pub loading_date: NaiveDate,
    pub status: ShipmentStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub items: Vec<LoadingItem>,
}

// ==========================================
// LoadingItem - 装柜明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingItem {
    pub id: i64,
    pub sheet_id: i64,
    pub ctn_mark_id: i64,
    pub ctn_mark: String,
    pub particular: String,
    pub item_no: Option<String>,
    pub ctn: i64,   // 箱数
    pub pcs: i64,   // 每箱件数
    pub tpcs: i64,  // ctn × pcs
    pub cbm: f64,   // 每箱体积
    pub tcbm: f64,  // ctn × cbm (3 位小数)
    pub wt: f64,    // 每箱重量
    pub twt: f64,   // ctn × wt (2 位小数)
    pub unit: Option<String>,
    pub photo: Option<String>,
}

// ==========================================
// FieldValue - 上传/表单原始单元格
// ==========================================
/// 数值字段既可能是数字也可能是字符串,统一由宽松解析处理
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

// ==========================================
// ShipmentRow - 导入行（上传层契约）
// ==========================================
/// 上传层/表单把每一行规范化成该结构后调用 ingest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRow {
    #[serde(default)]
    pub particular: String,
    #[serde(default, alias = "itemNo")]
    pub item_no: Option<String>,
    #[serde(default, alias = "ctnMark")]
    pub ctn_mark: Option<String>,
    #[serde(default)]
    pub ctn: Option<FieldValue>,
    #[serde(default)]
    pub pcs: Option<FieldValue>,
    #[serde(default)]
    pub cbm: Option<FieldValue>,
    #[serde(default)]
    pub wt: Option<FieldValue>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl ShipmentRow {
    /// 便捷构造（测试与表单使用）
    pub fn new(particular: &str, ctn_mark: &str) -> Self {
        Self {
            particular: particular.to_string(),
            ctn_mark: Some(ctn_mark.to_string()),
            ..Default::default()
        }
    }

    pub fn with_quantities(
        mut self,
        ctn: impl Into<FieldValue>,
        pcs: impl Into<FieldValue>,
        cbm: impl Into<FieldValue>,
        wt: impl Into<FieldValue>,
    ) -> Self {
        self.ctn = Some(ctn.into());
        self.pcs = Some(pcs.into());
        self.cbm = Some(cbm.into());
        self.wt = Some(wt.into());
        self
    }
}

// ==========================================
// ItemDraft - 规范化后的待写入明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub particular: String,
    pub item_no: Option<String>,
    pub ctn_mark: String,
    pub ctn: i64,
    pub pcs: i64,
    pub tpcs: i64,
    pub cbm: f64,
    pub tcbm: f64,
    pub wt: f64,
    pub twt: f64,
    pub unit: Option<String>,
    pub photo: Option<String>,
}

// ==========================================
// SheetPatch - 装柜单字段更新
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetPatch {
    pub loading_date: Option<NaiveDate>,
    pub shipping_mark: Option<String>,
}

impl SheetPatch {
    pub fn is_empty(&self) -> bool {
        self.loading_date.is_none() && self.shipping_mark.is_none()
    }
}

// ==========================================
// SheetSnapshot - 写入活动日志的装柜单快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    pub sheet_id: i64,
    pub container_code: String,
    pub shipping_mark: String,
    pub loading_date: NaiveDate,
    pub status: ShipmentStatus,
    pub item_count: usize,
    pub total_ctn: i64,
    pub total_pcs: i64,
}

impl LoadingSheet {
    /// 生成活动日志快照
    pub fn snapshot(&self) -> SheetSnapshot {
        SheetSnapshot {
            sheet_id: self.id,
            container_code: self.container_code.clone(),
            shipping_mark: self.shipping_mark.clone(),
            loading_date: self.loading_date,
            status: self.status,
            item_count: self.items.len(),
            total_ctn: self.items.iter().map(|i| i.ctn).sum(),
            total_pcs: self.items.iter().map(|i| i.tpcs).sum(),
        }
    }
}
