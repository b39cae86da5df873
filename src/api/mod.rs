// ==========================================
// 货代后台系统 - API 层
// ==========================================
// 职责: 对外操作面,划定事务边界
// 约束: 一个逻辑写操作 = 一次加锁 + 一个事务 + 对应活动日志
// ==========================================

pub mod activity_api;
pub mod aggregation_api;
pub mod document_api;
pub mod error;
pub mod shipment_api;
pub mod status_api;

// 重导出核心类型
pub use activity_api::ActivityApi;
pub use aggregation_api::AggregationApi;
pub use document_api::DocumentApi;
pub use error::{ApiError, ApiResult};
pub use shipment_api::{ShipmentApi, LOADING_ACTIVITY_TABLE};
pub use status_api::StatusApi;

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// 获取共享连接
pub(crate) fn lock_conn(conn: &Arc<Mutex<Connection>>) -> ApiResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", e)))
}
