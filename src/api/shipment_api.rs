// ==========================================
// 货代后台系统 - 装柜单 API
// ==========================================
// 职责: 装柜单录入/修改/删除/导出登记
// 红线: 每个写操作与其活动日志在同一事务内提交
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::lock_conn;
use crate::config::ConfigManager;
use crate::domain::activity::{ActivityRecord, ActivityVocabulary, DocumentEvent, LoadingActivityType, NewActivity};
use crate::domain::shipment::{ItemDraft, LoadingItem, LoadingSheet, SheetPatch, SheetSnapshot, ShipmentRow};
use crate::domain::types::{ShipmentStatus, StatusVocabulary};
use crate::engine::ingestion::{fill_default_ctn_mark, normalize_row, normalize_rows, require_text};
use crate::repository::{
    ActivityRepository, ContainerRepository, LoadingSheetRepository, MarkRepository, UserRepository,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

/// 装柜单活动日志表
pub const LOADING_ACTIVITY_TABLE: &str = "loading_activity";

// ==========================================
// ShipmentApi - 装柜单API
// ==========================================
pub struct ShipmentApi {
    conn: Arc<Mutex<Connection>>,
    activities: ActivityRepository<LoadingActivityType>,
    config: Arc<ConfigManager>,
}

impl ShipmentApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self {
            activities: ActivityRepository::new(conn.clone(), LOADING_ACTIVITY_TABLE),
            conn,
            config,
        }
    }

    // ==========================================
    // 录入
    // ==========================================

    /// 录入一批装柜明细,生成一张新装柜单
    ///
    /// # 参数
    /// - `container_code`: 箱号（不存在则以 origin 新建,已存在则不改 origin）
    /// - `origin`: 起运地,空串时取配置 import.default_origin
    /// - `shipping_mark`: 客户唛头
    /// - `rows`: 非空明细行,数值字段宽松解析
    /// - `actor_id`: 操作人,None 为系统
    ///
    /// # 返回
    /// - Ok(LoadingSheet): 新装柜单（含明细,状态 DRAFT）
    /// - Err(ValidationError): rows 为空/必填字段为空
    #[instrument(skip(self, rows), fields(row_count = rows.len()))]
    pub fn ingest_shipment(
        &self,
        container_code: &str,
        origin: &str,
        shipping_mark: &str,
        loading_date: NaiveDate,
        rows: &[ShipmentRow],
        actor_id: Option<i64>,
    ) -> ApiResult<LoadingSheet> {
        let container_code = require_text("containerCode", container_code)?;
        let shipping_mark = require_text("shippingMark", shipping_mark)?;
        let origin = match origin.trim() {
            "" => self
                .config
                .get_default_origin()
                .map_err(|e| ApiError::InternalError(e.to_string()))?,
            o => o.to_string(),
        };
        let drafts = normalize_rows(rows, shipping_mark)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let container = ContainerRepository::upsert_tx(&tx, container_code, &origin, &now)?;
        let mark = MarkRepository::upsert_shipping_mark_tx(&tx, shipping_mark, Some(&origin), &now)?;
        let sheet_id = LoadingSheetRepository::insert_sheet_tx(
            &tx,
            container.id,
            mark.id,
            &loading_date,
            ShipmentStatus::initial(),
            actor_id,
            &now,
        )?;
        insert_items_tx(&tx, sheet_id, 0, &drafts, &now)?;

        let sheet = load_sheet_tx(&tx, sheet_id)?;
        self.activities.insert_tx(
            &tx,
            &NewActivity::new(LoadingActivityType::Create, actor_id)
                .for_parent(sheet_id)
                .with_scope(&sheet.container_code)
                .with_new(&sheet.snapshot())?,
        )?;
        tx.commit()?;

        info!(
            container_code = %sheet.container_code,
            shipping_mark = %sheet.shipping_mark,
            sheet_id,
            item_count = sheet.items.len(),
            "装柜单已录入"
        );
        Ok(sheet)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_sheet(&self, sheet_id: i64) -> ApiResult<LoadingSheet> {
        let conn = lock_conn(&self.conn)?;
        load_sheet_tx(&conn, sheet_id)
    }

    /// 集装箱下的全部装柜单
    pub fn list_container_sheets(&self, container_code: &str) -> ApiResult<Vec<LoadingSheet>> {
        let conn = lock_conn(&self.conn)?;
        let container = ContainerRepository::find_by_code_tx(&conn, container_code.trim())?
            .ok_or_else(|| ApiError::not_found("Container", container_code))?;
        Ok(LoadingSheetRepository::list_by_container_tx(&conn, container.id)?)
    }

    // ==========================================
    // 修改
    // ==========================================

    /// 修改装柜日期/客户唛头
    pub fn update_sheet(
        &self,
        sheet_id: i64,
        patch: &SheetPatch,
        actor_id: Option<i64>,
    ) -> ApiResult<LoadingSheet> {
        if patch.is_empty() {
            return Err(ApiError::ValidationError("没有需要更新的字段".to_string()));
        }

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let before = load_sheet_tx(&tx, sheet_id)?;
        let loading_date = patch.loading_date.unwrap_or(before.loading_date);
        let mark_id = match patch.shipping_mark.as_deref() {
            Some(name) => {
                let name = require_text("shippingMark", name)?;
                MarkRepository::upsert_shipping_mark_tx(&tx, name, None, &now)?.id
            }
            None => before.shipping_mark_id,
        };
        LoadingSheetRepository::update_fields_tx(&tx, sheet_id, &loading_date, mark_id, &now)?;

        let after = load_sheet_tx(&tx, sheet_id)?;
        self.log_tx(&tx, DocumentEvent::Updated, actor_id, &after, Some(&before.snapshot()), &after.snapshot(), &now)?;
        tx.commit()?;

        info!(sheet_id, "装柜单已更新");
        Ok(after)
    }

    /// 追加明细
    pub fn add_items(
        &self,
        sheet_id: i64,
        rows: &[ShipmentRow],
        actor_id: Option<i64>,
    ) -> ApiResult<LoadingSheet> {
        // 规范化在锁外完成; 缺省箱唛待读到装柜单后补上
        let mut drafts = normalize_rows(rows, "")?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let before = load_sheet_tx(&tx, sheet_id)?;
        fill_default_ctn_mark(&mut drafts, &before.shipping_mark);
        let start = LoadingSheetRepository::next_position_tx(&tx, sheet_id)?;
        insert_items_tx(&tx, sheet_id, start, &drafts, &now)?;
        LoadingSheetRepository::touch_tx(&tx, sheet_id, &now)?;

        let after = load_sheet_tx(&tx, sheet_id)?;
        self.log_tx(&tx, DocumentEvent::LineAdded, actor_id, &after, Some(&before.snapshot()), &after.snapshot(), &now)?;
        tx.commit()?;

        info!(sheet_id, added = drafts.len(), "装柜明细已追加");
        Ok(after)
    }

    /// 覆写一条明细（t 字段重算）
    pub fn update_item(
        &self,
        item_id: i64,
        row: &ShipmentRow,
        actor_id: Option<i64>,
    ) -> ApiResult<LoadingItem> {
        let mut drafts = vec![normalize_row(row, 1, "")?];

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let before = LoadingSheetRepository::find_item_tx(&tx, item_id)?
            .ok_or_else(|| ApiError::not_found("LoadingItem", item_id))?;
        let sheet = load_sheet_tx(&tx, before.sheet_id)?;
        fill_default_ctn_mark(&mut drafts, &sheet.shipping_mark);
        let draft = &drafts[0];
        let ctn_mark = MarkRepository::upsert_ctn_mark_tx(&tx, &draft.ctn_mark, &now)?;
        LoadingSheetRepository::update_item_tx(&tx, item_id, ctn_mark.id, draft)?;
        LoadingSheetRepository::touch_tx(&tx, sheet.id, &now)?;

        let after = LoadingSheetRepository::find_item_tx(&tx, item_id)?
            .ok_or_else(|| ApiError::not_found("LoadingItem", item_id))?;
        self.log_tx(&tx, DocumentEvent::LineUpdated, actor_id, &sheet, Some(&before), &after, &now)?;
        tx.commit()?;

        info!(sheet_id = sheet.id, item_id, "装柜明细已更新");
        Ok(after)
    }

    /// 删除一条明细
    pub fn delete_item(&self, item_id: i64, actor_id: Option<i64>) -> ApiResult<LoadingSheet> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let item = LoadingSheetRepository::find_item_tx(&tx, item_id)?
            .ok_or_else(|| ApiError::not_found("LoadingItem", item_id))?;
        LoadingSheetRepository::delete_item_tx(&tx, item_id)?;
        LoadingSheetRepository::touch_tx(&tx, item.sheet_id, &now)?;

        let after = load_sheet_tx(&tx, item.sheet_id)?;
        self.log_tx(&tx, DocumentEvent::LineDeleted, actor_id, &after, Some(&item), &after.snapshot(), &now)?;
        tx.commit()?;

        info!(sheet_id = after.id, item_id, "装柜明细已删除");
        Ok(after)
    }

    // ==========================================
    // 删除 / 导出登记
    // ==========================================

    /// 删除装柜单
    ///
    /// 先写一条集装箱级 DELETE 日志（parent 为空,old_value 保留装柜单快照）,
    /// 再删除明细与装柜单; 装柜单自身的日志随外键级联删除
    pub fn delete_sheet(&self, sheet_id: i64, actor_id: Option<i64>) -> ApiResult<SheetSnapshot> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let sheet = load_sheet_tx(&tx, sheet_id)?;
        let snapshot = sheet.snapshot();
        let mut activity = NewActivity::new(LoadingActivityType::Delete, actor_id)
            .with_scope(&sheet.container_code)
            .with_old(&snapshot)?
            .with_new(&json!({ "deleted": true, "sheet_id": sheet_id }))?;
        activity.created_at = now;
        self.activities.insert_tx(&tx, &activity)?;
        let removed_items = LoadingSheetRepository::delete_sheet_tx(&tx, sheet_id)?;
        tx.commit()?;

        info!(
            container_code = %snapshot.container_code,
            sheet_id,
            removed_items,
            "装柜单已删除"
        );
        Ok(snapshot)
    }

    /// 导出层渲染完成后登记一条集装箱级 EXPORT 日志
    pub fn record_export(
        &self,
        container_code: &str,
        format: &str,
        actor_id: Option<i64>,
    ) -> ApiResult<ActivityRecord<LoadingActivityType>> {
        let format = require_text("format", format)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let container = ContainerRepository::find_by_code_tx(&tx, container_code.trim())?
            .ok_or_else(|| ApiError::not_found("Container", container_code))?;
        let id = self.activities.insert_tx(
            &tx,
            &NewActivity::new(LoadingActivityType::Export, actor_id)
                .with_scope(&container.code)
                .with_new(&json!({ "container_code": container.code, "format": format }))?,
        )?;
        let record = self
            .activities
            .find_by_id_tx(&tx, id)?
            .ok_or_else(|| ApiError::InternalError("导出日志写入后读取失败".to_string()))?;
        tx.commit()?;

        info!(container_code = %container.code, format, "导出已登记");
        Ok(record)
    }

    #[allow(clippy::too_many_arguments)]
    fn log_tx<O: serde::Serialize, N: serde::Serialize>(
        &self,
        tx: &Connection,
        event: DocumentEvent,
        actor_id: Option<i64>,
        sheet: &LoadingSheet,
        old_value: Option<&O>,
        new_value: &N,
        now: &NaiveDateTime,
    ) -> ApiResult<i64> {
        let mut activity = NewActivity::new(LoadingActivityType::for_event(event), actor_id)
            .for_parent(sheet.id)
            .with_scope(&sheet.container_code)
            .with_new(new_value)?;
        if let Some(old) = old_value {
            activity = activity.with_old(old)?;
        }
        activity.created_at = *now;
        Ok(self.activities.insert_tx(tx, &activity)?)
    }
}

// ==========================================
// 事务内辅助
// ==========================================

/// 读取装柜单,不存在返回 NotFound
pub(crate) fn load_sheet_tx(conn: &Connection, sheet_id: i64) -> ApiResult<LoadingSheet> {
    LoadingSheetRepository::find_by_id_tx(conn, sheet_id)?
        .ok_or_else(|| ApiError::not_found("LoadingSheet", sheet_id))
}

/// 写入明细,箱唛按名称懒创建（同批内缓存）
fn insert_items_tx(
    conn: &Connection,
    sheet_id: i64,
    start_position: i64,
    drafts: &[ItemDraft],
    now: &NaiveDateTime,
) -> ApiResult<()> {
    let mut ctn_marks: HashMap<&str, i64> = HashMap::new();
    for (offset, draft) in drafts.iter().enumerate() {
        let ctn_mark_id = match ctn_marks.get(draft.ctn_mark.as_str()) {
            Some(id) => *id,
            None => {
                let mark = MarkRepository::upsert_ctn_mark_tx(conn, &draft.ctn_mark, now)?;
                ctn_marks.insert(draft.ctn_mark.as_str(), mark.id);
                mark.id
            }
        };
        LoadingSheetRepository::insert_item_tx(
            conn,
            sheet_id,
            ctn_mark_id,
            start_position + offset as i64,
            draft,
        )?;
    }
    Ok(())
}
