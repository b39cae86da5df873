// ==========================================
// 货代后台系统 - 领域类型定义
// ==========================================
// 职责: 各业务模块的状态词表
// 说明: 状态之间不设迁移图,任意状态可互相切换
// ==========================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// StatusVocabulary - 状态词表
// ==========================================
/// 每个模块允许的状态集合
///
/// 数据库中以 `as_str()` 的大写字符串存储
pub trait StatusVocabulary:
    Copy + Eq + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 词表名称（用于错误提示）
    const VOCABULARY: &'static str;

    /// 全部合法状态（按业务顺序）
    const ALL: &'static [Self];

    /// 新建实体时的初始状态
    fn initial() -> Self;

    /// 转换为存储字符串
    fn as_str(&self) -> &'static str;

    /// 从字符串解析（忽略大小写与首尾空白）
    fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(wanted))
    }
}

// ==========================================
// 装柜/运输状态 (Shipment Status)
// ==========================================
// 装柜单、分拨记录共用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    Draft,     // 草稿
    InTransit, // 在途
    Arrived,   // 到港
    Warehouse, // 入仓
    Available, // 可提货
    Completed, // 完结
}

impl StatusVocabulary for ShipmentStatus {
    const VOCABULARY: &'static str = "shipment";
    const ALL: &'static [Self] = &[
        ShipmentStatus::Draft,
        ShipmentStatus::InTransit,
        ShipmentStatus::Arrived,
        ShipmentStatus::Warehouse,
        ShipmentStatus::Available,
        ShipmentStatus::Completed,
    ];

    fn initial() -> Self {
        ShipmentStatus::Draft
    }

    fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Draft => "DRAFT",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::Arrived => "ARRIVED",
            ShipmentStatus::Warehouse => "WAREHOUSE",
            ShipmentStatus::Available => "AVAILABLE",
            ShipmentStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 仓库计划/唛头状态 (Warehouse Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseStatus {
    Pending,   // 待处理
    Completed, // 已完成
    Draft,     // 草稿
    Hold,      // 暂扣
}

impl StatusVocabulary for WarehouseStatus {
    const VOCABULARY: &'static str = "warehouse";
    const ALL: &'static [Self] = &[
        WarehouseStatus::Pending,
        WarehouseStatus::Completed,
        WarehouseStatus::Draft,
        WarehouseStatus::Hold,
    ];

    fn initial() -> Self {
        WarehouseStatus::Pending
    }

    fn as_str(&self) -> &'static str {
        match self {
            WarehouseStatus::Pending => "PENDING",
            WarehouseStatus::Completed => "COMPLETED",
            WarehouseStatus::Draft => "DRAFT",
            WarehouseStatus::Hold => "HOLD",
        }
    }
}

impl fmt::Display for WarehouseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 单证状态 (Document Status)
// ==========================================
// 商业发票、装箱单共用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Draft,     // 草稿
    Final,     // 定稿
    Cancelled, // 作废
}

impl StatusVocabulary for DocumentStatus {
    const VOCABULARY: &'static str = "document";
    const ALL: &'static [Self] = &[
        DocumentStatus::Draft,
        DocumentStatus::Final,
        DocumentStatus::Cancelled,
    ];

    fn initial() -> Self {
        DocumentStatus::Draft
    }

    fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Draft => "DRAFT",
            DocumentStatus::Final => "FINAL",
            DocumentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 收款状态 (Collection Status)
// ==========================================
// 收款/对账表使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    Pending, // 未收
    Partial, // 部分收款
    Paid,    // 已结清
}

impl StatusVocabulary for CollectionStatus {
    const VOCABULARY: &'static str = "collection";
    const ALL: &'static [Self] = &[
        CollectionStatus::Pending,
        CollectionStatus::Partial,
        CollectionStatus::Paid,
    ];

    fn initial() -> Self {
        CollectionStatus::Pending
    }

    fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Pending => "PENDING",
            CollectionStatus::Partial => "PARTIAL",
            CollectionStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipment_status_parse() {
        assert_eq!(ShipmentStatus::parse("in_transit"), Some(ShipmentStatus::InTransit));
        assert_eq!(ShipmentStatus::parse(" ARRIVED "), Some(ShipmentStatus::Arrived));
        assert_eq!(ShipmentStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn test_serde_matches_storage_string() {
        for status in ShipmentStatus::ALL {
            let json = serde_json::to_string(status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        let hold: WarehouseStatus = serde_json::from_str("\"HOLD\"").unwrap();
        assert_eq!(hold, WarehouseStatus::Hold);
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(ShipmentStatus::initial(), ShipmentStatus::Draft);
        assert_eq!(WarehouseStatus::initial(), WarehouseStatus::Pending);
        assert_eq!(DocumentStatus::initial(), DocumentStatus::Draft);
        assert_eq!(CollectionStatus::initial(), CollectionStatus::Pending);
    }
}
