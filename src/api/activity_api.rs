// ==========================================
// 货代后台系统 - 活动日志 API
// ==========================================
// 职责: 装柜单活动流的写入与查询
// 红线: 只追加,不修改; 列表按时间倒序
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::lock_conn;
use crate::api::shipment_api::{load_sheet_tx, LOADING_ACTIVITY_TABLE};
use crate::config::ConfigManager;
use crate::domain::activity::{ActivityRecord, ActivityVocabulary, LoadingActivityType, NewActivity};
use crate::repository::{ActivityRepository, UserRepository};
use rusqlite::Connection;
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct ActivityApi {
    conn: Arc<Mutex<Connection>>,
    activities: ActivityRepository<LoadingActivityType>,
    config: Arc<ConfigManager>,
}

impl ActivityApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self {
            activities: ActivityRepository::new(conn.clone(), LOADING_ACTIVITY_TABLE),
            conn,
            config,
        }
    }

    /// 追加一条装柜单活动日志
    ///
    /// # 参数
    /// - `activity_type`: 必须属于装柜单词表 (CREATE/UPDATE/STATUS_CHANGE/EXPORT/DELETE)
    /// - `old_value` / `new_value`: 调用方决定快照粒度,原样存储
    ///
    /// # 返回
    /// - Ok(ActivityRecord): 已落库日志（含操作人名称）
    /// - Err(NotFound): 装柜单或操作人不存在
    /// - Err(ValidationError): 活动类型不在词表内
    pub fn record_activity(
        &self,
        parent_id: i64,
        actor_id: Option<i64>,
        activity_type: &str,
        old_value: Option<JsonValue>,
        new_value: Option<JsonValue>,
        note: Option<String>,
    ) -> ApiResult<ActivityRecord<LoadingActivityType>> {
        let kind = parse_activity_type::<LoadingActivityType>(activity_type)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let sheet = load_sheet_tx(&tx, parent_id)?;
        let mut activity = NewActivity::new(kind, actor_id)
            .for_parent(sheet.id)
            .with_scope(&sheet.container_code)
            .with_note(note);
        activity.old_value = old_value;
        activity.new_value = new_value;

        let id = self.activities.insert_tx(&tx, &activity)?;
        let record = self
            .activities
            .find_by_id_tx(&tx, id)?
            .ok_or_else(|| ApiError::InternalError("活动日志写入后读取失败".to_string()))?;
        tx.commit()?;

        info!(sheet_id = parent_id, activity_type = %kind, "活动日志已记录");
        Ok(record)
    }

    /// 装柜单活动流（最新在前）
    ///
    /// # 参数
    /// - `limit`: None 取配置 activity.default_limit
    pub fn list_activities(
        &self,
        sheet_id: i64,
        limit: Option<u32>,
    ) -> ApiResult<Vec<ActivityRecord<LoadingActivityType>>> {
        let limit = self.resolve_limit(limit)?;
        Ok(self.activities.list_by_parent(sheet_id, limit)?)
    }

    /// 集装箱活动流: 各装柜单日志 + 集装箱级 DELETE/EXPORT
    pub fn list_container_activities(
        &self,
        container_code: &str,
        limit: Option<u32>,
    ) -> ApiResult<Vec<ActivityRecord<LoadingActivityType>>> {
        let limit = self.resolve_limit(limit)?;
        Ok(self.activities.list_by_scope(container_code.trim(), limit)?)
    }

    fn resolve_limit(&self, limit: Option<u32>) -> ApiResult<u32> {
        match limit {
            Some(n) if n > 0 => Ok(n),
            _ => self
                .config
                .get_activity_default_limit()
                .map_err(|e| ApiError::InternalError(e.to_string())),
        }
    }
}

/// 解析外部传入的活动类型
pub(crate) fn parse_activity_type<V: ActivityVocabulary>(raw: &str) -> ApiResult<V> {
    let wanted = raw.trim().to_ascii_uppercase();
    V::parse(&wanted).ok_or_else(|| {
        let allowed: Vec<&str> = V::ALL.iter().map(|t| t.as_str()).collect();
        ApiError::ValidationError(format!(
            "无效的活动类型: {} (允许: {})",
            raw.trim(),
            allowed.join(", ")
        ))
    })
}
