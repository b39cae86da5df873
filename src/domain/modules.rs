// ==========================================
// 货代后台系统 - 各单证模块参数
// ==========================================
// 每个模块 = 状态词表 + 活动词表 + 表头 + 明细
// ==========================================

use crate::domain::activity::{DocumentActivityType, WarehouseActivityType};
use crate::domain::document::{DocumentKind, DocumentLine, LineMeasures};
use crate::domain::types::{CollectionStatus, DocumentStatus, ShipmentStatus, WarehouseStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn ensure_non_negative(field: &str, value: f64) -> Result<(), String> {
    if value < 0.0 || value.is_nan() {
        return Err(format!("{}不能为负数", field));
    }
    Ok(())
}

// ==========================================
// Bifurcation - 分拨记录（按客户拆分集装箱）
// ==========================================
pub struct Bifurcation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BifurcationHeader {
    pub arrival_date: Option<NaiveDate>,
    pub destination: Option<String>,
    pub remarks: Option<String>,
}

/// 分拨客户条目（cbm / weight 为总量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEntry {
    pub client: String,
    pub ctn_mark: Option<String>,
    pub ctn: i64,
    pub pcs: i64,
    pub cbm: f64,
    pub weight: f64,
    pub delivery_location: Option<String>,
}

impl DocumentLine for ClientEntry {
    fn group_key(&self) -> String {
        self.client.trim().to_string()
    }

    fn measures(&self) -> LineMeasures {
        LineMeasures {
            ctn: self.ctn,
            pcs: self.pcs,
            cbm: self.cbm,
            weight: self.weight,
            amount: 0.0,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.client.trim().is_empty() {
            return Err("客户名不能为空".to_string());
        }
        ensure_non_negative("ctn", self.ctn as f64)?;
        ensure_non_negative("cbm", self.cbm)?;
        ensure_non_negative("weight", self.weight)
    }
}

impl DocumentKind for Bifurcation {
    const NAME: &'static str = "bifurcation";
    const TABLE_PREFIX: &'static str = "bifurcation";
    type Status = ShipmentStatus;
    type Activity = DocumentActivityType;
    type Header = BifurcationHeader;
    type Line = ClientEntry;
}

// ==========================================
// WarehousePlan - 仓库计划（按唛头入仓）
// ==========================================
pub struct WarehousePlan;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarehousePlanHeader {
    pub warehouse: String,
    pub planned_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseMark {
    pub mark: String,
    pub ctn: i64,
    pub cbm: f64,
    pub weight: f64,
    pub location: Option<String>,
    pub status: WarehouseStatus,
}

impl DocumentLine for WarehouseMark {
    fn group_key(&self) -> String {
        self.mark.trim().to_string()
    }

    fn measures(&self) -> LineMeasures {
        LineMeasures {
            ctn: self.ctn,
            pcs: 0,
            cbm: self.cbm,
            weight: self.weight,
            amount: 0.0,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.mark.trim().is_empty() {
            return Err("唛头不能为空".to_string());
        }
        ensure_non_negative("ctn", self.ctn as f64)?;
        ensure_non_negative("cbm", self.cbm)?;
        ensure_non_negative("weight", self.weight)
    }
}

impl DocumentKind for WarehousePlan {
    const NAME: &'static str = "warehouse_plan";
    const TABLE_PREFIX: &'static str = "warehouse_plan";
    type Status = WarehouseStatus;
    type Activity = WarehouseActivityType;
    type Header = WarehousePlanHeader;
    type Line = WarehouseMark;
}

// ==========================================
// CommercialInvoice - 商业发票
// ==========================================
pub struct CommercialInvoice;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub seller: String,
    pub buyer: String,
    pub currency: String,
    pub invoice_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub hsn_code: Option<String>,
    pub quantity: i64,
    pub unit: Option<String>,
    pub unit_price: f64,
}

impl DocumentLine for InvoiceItem {
    fn group_key(&self) -> String {
        self.description.trim().to_string()
    }

    fn measures(&self) -> LineMeasures {
        LineMeasures {
            ctn: 0,
            pcs: self.quantity,
            cbm: 0.0,
            weight: 0.0,
            amount: self.quantity as f64 * self.unit_price,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("品名不能为空".to_string());
        }
        ensure_non_negative("quantity", self.quantity as f64)?;
        ensure_non_negative("unit_price", self.unit_price)
    }
}

impl DocumentKind for CommercialInvoice {
    const NAME: &'static str = "commercial_invoice";
    const TABLE_PREFIX: &'static str = "commercial_invoice";
    type Status = DocumentStatus;
    type Activity = DocumentActivityType;
    type Header = InvoiceHeader;
    type Line = InvoiceItem;
}

// ==========================================
// PackingList - 装箱单
// ==========================================
pub struct PackingList;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackingListHeader {
    pub consignee: String,
    pub invoice_reference: Option<String>,
    pub packing_date: Option<NaiveDate>,
}

/// 装箱单明细（单箱值,汇总时乘箱数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingItem {
    pub ctn_mark: String,
    pub description: String,
    pub ctn: i64,
    pub pcs_per_ctn: i64,
    pub net_weight_per_ctn: f64,
    pub gross_weight_per_ctn: f64,
    pub cbm_per_ctn: f64,
}

impl DocumentLine for PackingItem {
    fn group_key(&self) -> String {
        self.ctn_mark.trim().to_string()
    }

    fn measures(&self) -> LineMeasures {
        let ctn = self.ctn as f64;
        LineMeasures {
            ctn: self.ctn,
            pcs: self.ctn.saturating_mul(self.pcs_per_ctn),
            cbm: ctn * self.cbm_per_ctn,
            weight: ctn * self.gross_weight_per_ctn,
            amount: 0.0,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.ctn_mark.trim().is_empty() {
            return Err("箱唛不能为空".to_string());
        }
        ensure_non_negative("ctn", self.ctn as f64)?;
        ensure_non_negative("pcs_per_ctn", self.pcs_per_ctn as f64)?;
        ensure_non_negative("gross_weight_per_ctn", self.gross_weight_per_ctn)?;
        if self.net_weight_per_ctn > self.gross_weight_per_ctn {
            return Err("净重不能大于毛重".to_string());
        }
        ensure_non_negative("cbm_per_ctn", self.cbm_per_ctn)
    }
}

impl DocumentKind for PackingList {
    const NAME: &'static str = "packing_list";
    const TABLE_PREFIX: &'static str = "packing_list";
    type Status = DocumentStatus;
    type Activity = DocumentActivityType;
    type Header = PackingListHeader;
    type Line = PackingItem;
}

// ==========================================
// AccountingSheet - 收款/对账表
// ==========================================
pub struct AccountingSheet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountingHeader {
    pub currency: String,
    pub period: Option<String>,
    pub remarks: Option<String>,
}

/// 收款条目; amount = debit - credit (应收余额)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountingEntry {
    pub client: String,
    pub description: Option<String>,
    pub debit: f64,
    pub credit: f64,
    pub entry_date: Option<NaiveDate>,
}

impl DocumentLine for AccountingEntry {
    fn group_key(&self) -> String {
        self.client.trim().to_string()
    }

    fn measures(&self) -> LineMeasures {
        LineMeasures {
            amount: self.debit - self.credit,
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.client.trim().is_empty() {
            return Err("客户名不能为空".to_string());
        }
        ensure_non_negative("debit", self.debit)?;
        ensure_non_negative("credit", self.credit)
    }
}

impl DocumentKind for AccountingSheet {
    const NAME: &'static str = "accounting_sheet";
    const TABLE_PREFIX: &'static str = "accounting_sheet";
    type Status = CollectionStatus;
    type Activity = DocumentActivityType;
    type Header = AccountingHeader;
    type Line = AccountingEntry;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing_item_measures_multiply_by_ctn() {
        let item = PackingItem {
            ctn_mark: "A1".to_string(),
            description: "Widget".to_string(),
            ctn: 4,
            pcs_per_ctn: 12,
            net_weight_per_ctn: 9.0,
            gross_weight_per_ctn: 10.5,
            cbm_per_ctn: 0.05,
        };
        let m = item.measures();
        assert_eq!(m.pcs, 48);
        assert_eq!(m.weight, 42.0);
        assert!((m.cbm - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_packing_item_net_over_gross_rejected() {
        let item = PackingItem {
            ctn_mark: "A1".to_string(),
            description: "Widget".to_string(),
            ctn: 1,
            pcs_per_ctn: 1,
            net_weight_per_ctn: 11.0,
            gross_weight_per_ctn: 10.0,
            cbm_per_ctn: 0.01,
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_accounting_entry_balance() {
        let entry = AccountingEntry {
            client: "ACME".to_string(),
            description: None,
            debit: 1200.0,
            credit: 450.5,
            entry_date: None,
        };
        assert_eq!(entry.measures().amount, 749.5);
    }

    #[test]
    fn test_blank_client_rejected() {
        let entry = ClientEntry {
            client: "  ".to_string(),
            ctn_mark: None,
            ctn: 1,
            pcs: 1,
            cbm: 0.1,
            weight: 1.0,
            delivery_location: None,
        };
        assert!(entry.validate().is_err());
    }
}
