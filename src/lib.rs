// ==========================================
// 货代后台系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 范围: 装柜录入 / 分客户汇总 / 活动日志 / 状态管理 / 通用单证
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - CSV/Excel
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 共享状态装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    CollectionStatus, DocumentStatus, ShipmentStatus, StatusVocabulary, WarehouseStatus,
};

// 领域实体
pub use domain::{
    ActivityRecord, AggregateFilters, Container, ContainerAggregate, ContainerPage, LoadingItem,
    LoadingSheet, ShipmentRow,
};

// API
pub use api::{
    ActivityApi, AggregationApi, ApiError, ApiResult, DocumentApi, ShipmentApi, StatusApi,
};

// 应用状态
pub use app::AppState;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "货代后台系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
