// ==========================================
// 货代后台系统 - 装柜单状态 API
// ==========================================
// 职责: 单张改状态 / 按集装箱批量改状态
// 红线: 批量操作全部成功才提交,日志条数 = 更新条数
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::lock_conn;
use crate::api::shipment_api::{load_sheet_tx, LOADING_ACTIVITY_TABLE};
use crate::domain::activity::{BulkStatusOutcome, LoadingActivityType, NewActivity};
use crate::domain::shipment::LoadingSheet;
use crate::domain::types::ShipmentStatus;
use crate::engine::lifecycle::LifecycleManager;
use crate::repository::{ActivityRepository, ContainerRepository, LoadingSheetRepository, UserRepository};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct StatusApi {
    conn: Arc<Mutex<Connection>>,
    activities: ActivityRepository<LoadingActivityType>,
    lifecycle: LifecycleManager,
}

impl StatusApi {
    pub fn new(conn: Arc<Mutex<Connection>>, lifecycle: LifecycleManager) -> Self {
        Self {
            activities: ActivityRepository::new(conn.clone(), LOADING_ACTIVITY_TABLE),
            conn,
            lifecycle,
        }
    }

    /// 修改单张装柜单状态
    ///
    /// 原地切换（新旧相同）同样记一条 STATUS_CHANGE
    ///
    /// # 返回
    /// - Ok(LoadingSheet): 更新后的装柜单
    /// - Err(ValidationError): 状态不在词表内
    /// - Err(NotFound): 装柜单不存在
    pub fn update_status(
        &self,
        sheet_id: i64,
        new_status: &str,
        actor_id: Option<i64>,
        note: Option<String>,
    ) -> ApiResult<LoadingSheet> {
        let to: ShipmentStatus = self.lifecycle.parse_status(new_status)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let before = load_sheet_tx(&tx, sheet_id)?;
        self.change_status_tx(&tx, &before, to, actor_id, note, None, &now)?;
        let after = load_sheet_tx(&tx, sheet_id)?;
        tx.commit()?;

        info!(
            sheet_id,
            container_code = %after.container_code,
            from = %before.status,
            to = %to,
            "装柜单状态已更新"
        );
        Ok(after)
    }

    /// 批量修改集装箱下全部装柜单状态
    ///
    /// # 返回
    /// - Ok(BulkStatusOutcome): 更新条数 + 批次号 + 共享时间戳
    /// - Err: 任一装柜单失败则整体回滚,返回第一个错误
    pub fn bulk_update_status(
        &self,
        container_code: &str,
        new_status: &str,
        actor_id: Option<i64>,
        note: Option<String>,
    ) -> ApiResult<BulkStatusOutcome> {
        let to: ShipmentStatus = self.lifecycle.parse_status(new_status)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();
        let batch_id = uuid::Uuid::new_v4().to_string();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let container = ContainerRepository::find_by_code_tx(&tx, container_code.trim())?
            .ok_or_else(|| ApiError::not_found("Container", container_code))?;
        let sheet_ids = LoadingSheetRepository::list_ids_by_container_tx(&tx, container.id)?;

        for sheet_id in &sheet_ids {
            let before = load_sheet_tx(&tx, *sheet_id)?;
            if let Err(e) =
                self.change_status_tx(&tx, &before, to, actor_id, note.clone(), Some(&batch_id), &now)
            {
                // tx 未提交,drop 时回滚
                warn!(container_code = %container.code, sheet_id, error = %e, "批量改状态失败,已回滚");
                return Err(e);
            }
        }
        tx.commit()?;

        info!(
            container_code = %container.code,
            status = %to,
            updated_count = sheet_ids.len(),
            batch_id = %batch_id,
            "集装箱状态已批量更新"
        );
        Ok(BulkStatusOutcome {
            updated_count: sheet_ids.len(),
            batch_id,
            changed_at: now,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn change_status_tx(
        &self,
        tx: &Connection,
        sheet: &LoadingSheet,
        to: ShipmentStatus,
        actor_id: Option<i64>,
        note: Option<String>,
        batch_id: Option<&str>,
        now: &NaiveDateTime,
    ) -> ApiResult<i64> {
        self.lifecycle.check_transition(sheet.status, to)?;
        LoadingSheetRepository::update_status_tx(tx, sheet.id, to, now)?;

        let mut activity = NewActivity::new(LoadingActivityType::StatusChange, actor_id)
            .for_parent(sheet.id)
            .with_scope(&sheet.container_code)
            .with_old(&json!({ "status": sheet.status }))?
            .with_new(&json!({ "status": to }))?
            .with_note(note);
        activity = match batch_id {
            Some(batch) => activity.in_batch(batch, *now),
            None => {
                activity.created_at = *now;
                activity
            }
        };
        Ok(self.activities.insert_tx(tx, &activity)?)
    }
}
