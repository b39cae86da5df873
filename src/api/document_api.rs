// ==========================================
// 货代后台系统 - 通用单证 API
// ==========================================
// 分拨 / 仓库计划 / 商业发票 / 装箱单 / 收款表 共用一套实现
// 每个写操作 = 一个事务 + 一条活动日志（批量: 每条记录一条）
// 活动日志 scope_ref = 单证 reference
// ==========================================

use crate::api::activity_api::parse_activity_type;
use crate::api::error::{ApiError, ApiResult};
use crate::api::lock_conn;
use crate::config::ConfigManager;
use crate::domain::activity::{ActivityRecord, ActivityVocabulary, BulkStatusOutcome, DocumentEvent, NewActivity};
use crate::domain::aggregation::Pagination;
use crate::domain::document::{
    DocumentFilters, DocumentKind, DocumentLine, DocumentSummary, LineRecord, RecordOf, RecordPage,
};
use crate::domain::types::StatusVocabulary;
use crate::engine::aggregation::summarize_document;
use crate::engine::ingestion::require_text;
use crate::engine::lifecycle::LifecycleManager;
use crate::repository::{ActivityRepository, ContainerRepository, DocumentRepository, UserRepository};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub struct DocumentApi<K: DocumentKind> {
    conn: Arc<Mutex<Connection>>,
    activities: ActivityRepository<K::Activity>,
    lifecycle: LifecycleManager,
    config: Arc<ConfigManager>,
}

impl<K: DocumentKind> DocumentApi<K> {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        lifecycle: LifecycleManager,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            activities: ActivityRepository::new(conn.clone(), K::activity_table()),
            conn,
            lifecycle,
            config,
        }
    }

    // ==========================================
    // 新建 / 查询
    // ==========================================

    /// 新建单证
    ///
    /// # 参数
    /// - `reference`: 业务编号（唯一）
    /// - `container_code`: 关联集装箱,给出时必须已存在
    /// - `lines`: 初始明细,可以为空
    ///
    /// # 返回
    /// - Err(ValidationError): reference 为空 / 明细校验失败
    /// - Err(NotFound): 集装箱或操作人不存在
    /// - Err(Conflict): reference 重复
    pub fn create(
        &self,
        reference: &str,
        container_code: Option<&str>,
        header: K::Header,
        lines: Vec<K::Line>,
        actor_id: Option<i64>,
    ) -> ApiResult<RecordOf<K>> {
        let reference = require_text("reference", reference)?;
        for (idx, line) in lines.iter().enumerate() {
            validate_line(idx + 1, line)?;
        }
        let container_code = container_code.map(str::trim).filter(|c| !c.is_empty());

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        if let Some(code) = container_code {
            if ContainerRepository::find_by_code_tx(&tx, code)?.is_none() {
                return Err(ApiError::not_found("Container", code));
            }
        }
        let record_id = DocumentRepository::<K>::insert_record_tx(
            &tx,
            reference,
            container_code,
            K::Status::initial(),
            &header,
            actor_id,
            &now,
        )?;
        for (position, line) in lines.iter().enumerate() {
            DocumentRepository::<K>::insert_line_tx(&tx, record_id, position as i64, line)?;
        }

        let record = load_record_tx::<K>(&tx, record_id)?;
        self.log_tx(&tx, DocumentEvent::Created, actor_id, &record, None::<&()>, &record.snapshot(), &now)?;
        tx.commit()?;

        info!(
            module = K::NAME,
            record_id,
            reference,
            line_count = record.lines.len(),
            "单证已创建"
        );
        Ok(record)
    }

    pub fn get(&self, record_id: i64) -> ApiResult<RecordOf<K>> {
        let conn = lock_conn(&self.conn)?;
        load_record_tx::<K>(&conn, record_id)
    }

    /// 分页列表（最新创建在前）
    ///
    /// page/limit 规则与集装箱看板一致
    pub fn list(
        &self,
        filters: &DocumentFilters<K::Status>,
        page: u32,
        limit: u32,
    ) -> ApiResult<RecordPage<RecordOf<K>>> {
        let map_err = |e: Box<dyn std::error::Error>| ApiError::InternalError(e.to_string());
        let max = self.config.get_max_page_size().map_err(map_err)?.max(1);
        let limit = match limit {
            0 => self.config.get_default_page_size().map_err(map_err)?,
            n => n,
        }
        .clamp(1, max);
        let page = page.max(1);
        let offset = (page as usize - 1) * limit as usize;

        let conn = lock_conn(&self.conn)?;
        let (records, total) = DocumentRepository::<K>::list_page_tx(&conn, filters, limit, offset)?;
        Ok(RecordPage {
            records,
            pagination: Pagination::new(page, limit, total),
        })
    }

    // ==========================================
    // 修改
    // ==========================================

    pub fn update_header(
        &self,
        record_id: i64,
        header: K::Header,
        actor_id: Option<i64>,
    ) -> ApiResult<RecordOf<K>> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let before = load_record_tx::<K>(&tx, record_id)?;
        DocumentRepository::<K>::update_header_tx(&tx, record_id, &header, &now)?;
        let after = load_record_tx::<K>(&tx, record_id)?;
        self.log_tx(
            &tx,
            DocumentEvent::Updated,
            actor_id,
            &after,
            Some(&before.snapshot()),
            &after.snapshot(),
            &now,
        )?;
        tx.commit()?;

        info!(module = K::NAME, record_id, "单证表头已更新");
        Ok(after)
    }

    pub fn add_line(
        &self,
        record_id: i64,
        line: K::Line,
        actor_id: Option<i64>,
    ) -> ApiResult<LineRecord<K::Line>> {
        validate_line(1, &line)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let record = load_record_tx::<K>(&tx, record_id)?;
        let position = DocumentRepository::<K>::next_position_tx(&tx, record_id)?;
        let line_id = DocumentRepository::<K>::insert_line_tx(&tx, record_id, position, &line)?;
        DocumentRepository::<K>::touch_tx(&tx, record_id, &now)?;
        let added = load_line_tx::<K>(&tx, line_id)?;
        self.log_tx(&tx, DocumentEvent::LineAdded, actor_id, &record, None::<&()>, &added, &now)?;
        tx.commit()?;

        info!(module = K::NAME, record_id, line_id, "单证明细已追加");
        Ok(added)
    }

    pub fn update_line(
        &self,
        line_id: i64,
        line: K::Line,
        actor_id: Option<i64>,
    ) -> ApiResult<LineRecord<K::Line>> {
        validate_line(1, &line)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let before = load_line_tx::<K>(&tx, line_id)?;
        let record = load_record_tx::<K>(&tx, before.record_id)?;
        DocumentRepository::<K>::update_line_tx(&tx, line_id, &line)?;
        DocumentRepository::<K>::touch_tx(&tx, record.id, &now)?;
        let after = load_line_tx::<K>(&tx, line_id)?;
        self.log_tx(&tx, DocumentEvent::LineUpdated, actor_id, &record, Some(&before), &after, &now)?;
        tx.commit()?;

        info!(module = K::NAME, record_id = record.id, line_id, "单证明细已更新");
        Ok(after)
    }

    pub fn delete_line(&self, line_id: i64, actor_id: Option<i64>) -> ApiResult<RecordOf<K>> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let removed = load_line_tx::<K>(&tx, line_id)?;
        DocumentRepository::<K>::delete_line_tx(&tx, line_id)?;
        DocumentRepository::<K>::touch_tx(&tx, removed.record_id, &now)?;
        let after = load_record_tx::<K>(&tx, removed.record_id)?;
        self.log_tx(
            &tx,
            DocumentEvent::LineDeleted,
            actor_id,
            &after,
            Some(&removed),
            &after.snapshot(),
            &now,
        )?;
        tx.commit()?;

        info!(module = K::NAME, record_id = after.id, line_id, "单证明细已删除");
        Ok(after)
    }

    // ==========================================
    // 状态
    // ==========================================

    pub fn update_status(
        &self,
        record_id: i64,
        new_status: &str,
        actor_id: Option<i64>,
        note: Option<String>,
    ) -> ApiResult<RecordOf<K>> {
        let to: K::Status = self.lifecycle.parse_status(new_status)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let before = load_record_tx::<K>(&tx, record_id)?;
        self.change_status_tx(&tx, &before, to, actor_id, note, None, &now)?;
        let after = load_record_tx::<K>(&tx, record_id)?;
        tx.commit()?;

        info!(module = K::NAME, record_id, from = %before.status, to = %to, "单证状态已更新");
        Ok(after)
    }

    /// 批量改状态,全部成功才提交
    ///
    /// 重复的 id 只处理一次（保留首次出现的顺序）
    pub fn bulk_update_status(
        &self,
        record_ids: &[i64],
        new_status: &str,
        actor_id: Option<i64>,
        note: Option<String>,
    ) -> ApiResult<BulkStatusOutcome> {
        let to: K::Status = self.lifecycle.parse_status(new_status)?;
        let mut seen = HashSet::new();
        let record_ids: Vec<i64> = record_ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();
        let batch_id = uuid::Uuid::new_v4().to_string();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        for record_id in &record_ids {
            let result = load_record_tx::<K>(&tx, *record_id).and_then(|before| {
                self.change_status_tx(&tx, &before, to, actor_id, note.clone(), Some(&batch_id), &now)
            });
            if let Err(e) = result {
                warn!(module = K::NAME, record_id, error = %e, "批量改状态失败,已回滚");
                return Err(e);
            }
        }
        tx.commit()?;

        info!(
            module = K::NAME,
            status = %to,
            updated_count = record_ids.len(),
            batch_id = %batch_id,
            "单证状态已批量更新"
        );
        Ok(BulkStatusOutcome {
            updated_count: record_ids.len(),
            batch_id,
            changed_at: now,
        })
    }

    // ==========================================
    // 删除 / 导出登记
    // ==========================================

    /// 删除单证
    ///
    /// 先写一条无父实体的 DELETE 日志（scope_ref 保留 reference）,
    /// 明细与原有日志随外键级联删除
    pub fn delete(&self, record_id: i64, actor_id: Option<i64>) -> ApiResult<()> {
        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let record = load_record_tx::<K>(&tx, record_id)?;
        self.activities.insert_tx(
            &tx,
            &NewActivity::new(K::Activity::for_event(DocumentEvent::Deleted), actor_id)
                .with_scope(&record.reference)
                .with_old(&record.snapshot())?
                .with_new(&json!({ "deleted": true, "record_id": record_id }))?,
        )?;
        DocumentRepository::<K>::delete_record_tx(&tx, record_id)?;
        tx.commit()?;

        info!(module = K::NAME, record_id, reference = %record.reference, "单证已删除");
        Ok(())
    }

    pub fn record_export(
        &self,
        record_id: i64,
        format: &str,
        actor_id: Option<i64>,
    ) -> ApiResult<ActivityRecord<K::Activity>> {
        let format = require_text("format", format)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().naive_utc();

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let record = load_record_tx::<K>(&tx, record_id)?;
        let id = self.log_tx(
            &tx,
            DocumentEvent::Exported,
            actor_id,
            &record,
            None::<&()>,
            &json!({ "reference": record.reference, "format": format }),
            &now,
        )?;
        let logged = self
            .activities
            .find_by_id_tx(&tx, id)?
            .ok_or_else(|| ApiError::InternalError("导出日志写入后读取失败".to_string()))?;
        tx.commit()?;

        info!(module = K::NAME, record_id, format, "单证导出已登记");
        Ok(logged)
    }

    // ==========================================
    // 汇总 / 活动流
    // ==========================================

    pub fn summarize(&self, record_id: i64) -> ApiResult<DocumentSummary> {
        let record = self.get(record_id)?;
        Ok(summarize_document(record.id, &record.reference, &record.lines))
    }

    pub fn list_activities(
        &self,
        record_id: i64,
        limit: Option<u32>,
    ) -> ApiResult<Vec<ActivityRecord<K::Activity>>> {
        let limit = self.resolve_activity_limit(limit)?;
        Ok(self.activities.list_by_parent(record_id, limit)?)
    }

    /// 按 reference 查询（含已删除单证的 DELETE 日志）
    pub fn list_reference_activities(
        &self,
        reference: &str,
        limit: Option<u32>,
    ) -> ApiResult<Vec<ActivityRecord<K::Activity>>> {
        let limit = self.resolve_activity_limit(limit)?;
        Ok(self.activities.list_by_scope(reference.trim(), limit)?)
    }

    /// 追加一条自定义活动日志
    pub fn record_activity(
        &self,
        record_id: i64,
        actor_id: Option<i64>,
        activity_type: &str,
        old_value: Option<JsonValue>,
        new_value: Option<JsonValue>,
        note: Option<String>,
    ) -> ApiResult<ActivityRecord<K::Activity>> {
        let kind = parse_activity_type::<K::Activity>(activity_type)?;

        let mut conn = lock_conn(&self.conn)?;
        let tx = conn.transaction()?;

        UserRepository::ensure_actor_tx(&tx, actor_id)?;
        let record = load_record_tx::<K>(&tx, record_id)?;
        let mut activity = NewActivity::new(kind, actor_id)
            .for_parent(record.id)
            .with_scope(&record.reference)
            .with_note(note);
        activity.old_value = old_value;
        activity.new_value = new_value;
        let id = self.activities.insert_tx(&tx, &activity)?;
        let logged = self
            .activities
            .find_by_id_tx(&tx, id)?
            .ok_or_else(|| ApiError::InternalError("活动日志写入后读取失败".to_string()))?;
        tx.commit()?;

        info!(module = K::NAME, record_id, activity_type = %kind, "活动日志已记录");
        Ok(logged)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn resolve_activity_limit(&self, limit: Option<u32>) -> ApiResult<u32> {
        match limit {
            Some(n) if n > 0 => Ok(n),
            _ => self
                .config
                .get_activity_default_limit()
                .map_err(|e| ApiError::InternalError(e.to_string())),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn change_status_tx(
        &self,
        tx: &Connection,
        record: &RecordOf<K>,
        to: K::Status,
        actor_id: Option<i64>,
        note: Option<String>,
        batch_id: Option<&str>,
        now: &NaiveDateTime,
    ) -> ApiResult<i64> {
        self.lifecycle.check_transition(record.status, to)?;
        DocumentRepository::<K>::update_status_tx(tx, record.id, to, now)?;

        let mut activity = NewActivity::new(K::Activity::for_event(DocumentEvent::StatusChanged), actor_id)
            .for_parent(record.id)
            .with_scope(&record.reference)
            .with_old(&json!({ "status": record.status }))?
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

    #[allow(clippy::too_many_arguments)]
    fn log_tx<O: Serialize, N: Serialize>(
        &self,
        tx: &Connection,
        event: DocumentEvent,
        actor_id: Option<i64>,
        record: &RecordOf<K>,
        old_value: Option<&O>,
        new_value: &N,
        now: &NaiveDateTime,
    ) -> ApiResult<i64> {
        let mut activity = NewActivity::new(K::Activity::for_event(event), actor_id)
            .for_parent(record.id)
            .with_scope(&record.reference)
            .with_new(new_value)?;
        if let Some(old) = old_value {
            activity = activity.with_old(old)?;
        }
        activity.created_at = *now;
        Ok(self.activities.insert_tx(tx, &activity)?)
    }
}

fn load_record_tx<K: DocumentKind>(conn: &Connection, record_id: i64) -> ApiResult<RecordOf<K>> {
    DocumentRepository::<K>::find_by_id_tx(conn, record_id)?
        .ok_or_else(|| ApiError::not_found(K::NAME, record_id))
}

fn load_line_tx<K: DocumentKind>(conn: &Connection, line_id: i64) -> ApiResult<LineRecord<K::Line>> {
    DocumentRepository::<K>::find_line_tx(conn, line_id)?
        .ok_or_else(|| ApiError::not_found(&format!("{}Line", K::NAME), line_id))
}

fn validate_line<L: DocumentLine>(line_no: usize, line: &L) -> ApiResult<()> {
    line.validate()
        .map_err(|reason| ApiError::ValidationError(format!("第{}条明细: {}", line_no, reason)))
}
