// ==========================================
// 货代后台系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、状态/活动词表、汇总输出结构
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod activity;
pub mod aggregation;
pub mod document;
pub mod modules;
pub mod shipment;
pub mod types;

// 重导出核心类型
pub use activity::{
    ActivityRecord, ActivityVocabulary, BulkStatusOutcome, DocumentActivityType, DocumentEvent,
    LoadingActivityType, NewActivity, WarehouseActivityType, SYSTEM_ACTOR_NAME,
};
pub use aggregation::{
    AggregateFilters, ClientGroup, ContainerAggregate, ContainerPage, ContainerSummary,
    GroupTotals, NumericRange, OverallTotals, Pagination, SortKey,
};
pub use document::{
    DocumentFilters, DocumentKind, DocumentLine, DocumentRecord, DocumentSummary, LineMeasures,
    LineRecord, MeasureTotals, RecordOf, RecordPage, RecordSnapshot,
};
pub use modules::{
    AccountingEntry, AccountingHeader, AccountingSheet, Bifurcation, BifurcationHeader,
    ClientEntry, CommercialInvoice, InvoiceHeader, InvoiceItem, PackingItem, PackingList,
    PackingListHeader, WarehouseMark, WarehousePlan, WarehousePlanHeader,
};
pub use shipment::{
    Container, CtnMark, FieldValue, ItemDraft, LoadingItem, LoadingSheet, SheetPatch,
    SheetSnapshot, ShipmentRow, ShippingMark, User,
};
pub use types::{CollectionStatus, DocumentStatus, ShipmentStatus, StatusVocabulary, WarehouseStatus};
