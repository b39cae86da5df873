// ==========================================
// 货代后台系统 - 活动日志领域模型
// ==========================================
// 红线: 活动日志只追加,不修改
// 用途: 审计追踪,前端活动流
// ==========================================

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// 无操作人时的展示名
pub const SYSTEM_ACTOR_NAME: &str = "System";

// ==========================================
// DocumentEvent - 通用变更事件
// ==========================================
/// 通用父子结构上发生的变更种类
///
/// 各模块通过 `ActivityVocabulary::for_event` 映射到自己的活动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentEvent {
    Created,
    Updated,
    LineAdded,
    LineUpdated,
    LineDeleted,
    StatusChanged,
    Exported,
    Deleted,
}

// ==========================================
// ActivityVocabulary - 活动类型词表
// ==========================================
pub trait ActivityVocabulary:
    Copy + Eq + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 全部合法活动类型
    const ALL: &'static [Self];

    /// 转换为存储字符串
    fn as_str(&self) -> &'static str;

    /// 通用事件 → 本模块活动类型
    fn for_event(event: DocumentEvent) -> Self;

    /// 从存储字符串解析
    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == value)
    }
}

// ==========================================
// LoadingActivityType - 装柜单活动类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadingActivityType {
    Create,
    Update,
    StatusChange,
    Export,
    Delete,
}

impl ActivityVocabulary for LoadingActivityType {
    const ALL: &'static [Self] = &[
        LoadingActivityType::Create,
        LoadingActivityType::Update,
        LoadingActivityType::StatusChange,
        LoadingActivityType::Export,
        LoadingActivityType::Delete,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            LoadingActivityType::Create => "CREATE",
            LoadingActivityType::Update => "UPDATE",
            LoadingActivityType::StatusChange => "STATUS_CHANGE",
            LoadingActivityType::Export => "EXPORT",
            LoadingActivityType::Delete => "DELETE",
        }
    }

    fn for_event(event: DocumentEvent) -> Self {
        match event {
            DocumentEvent::Created => LoadingActivityType::Create,
            // 明细增删改在装柜单上统一记为 UPDATE
            DocumentEvent::Updated
            | DocumentEvent::LineAdded
            | DocumentEvent::LineUpdated
            | DocumentEvent::LineDeleted => LoadingActivityType::Update,
            DocumentEvent::StatusChanged => LoadingActivityType::StatusChange,
            DocumentEvent::Exported => LoadingActivityType::Export,
            DocumentEvent::Deleted => LoadingActivityType::Delete,
        }
    }
}

impl fmt::Display for LoadingActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// WarehouseActivityType - 仓库计划活动类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseActivityType {
    Created,
    Updated,
    MarkAdded,
    MarkUpdated,
    MarkDeleted,
    StatusChange,
    Exported,
    Deleted,
}

impl ActivityVocabulary for WarehouseActivityType {
    const ALL: &'static [Self] = &[
        WarehouseActivityType::Created,
        WarehouseActivityType::Updated,
        WarehouseActivityType::MarkAdded,
        WarehouseActivityType::MarkUpdated,
        WarehouseActivityType::MarkDeleted,
        WarehouseActivityType::StatusChange,
        WarehouseActivityType::Exported,
        WarehouseActivityType::Deleted,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            WarehouseActivityType::Created => "CREATED",
            WarehouseActivityType::Updated => "UPDATED",
            WarehouseActivityType::MarkAdded => "MARK_ADDED",
            WarehouseActivityType::MarkUpdated => "MARK_UPDATED",
            WarehouseActivityType::MarkDeleted => "MARK_DELETED",
            WarehouseActivityType::StatusChange => "STATUS_CHANGE",
            WarehouseActivityType::Exported => "EXPORTED",
            WarehouseActivityType::Deleted => "DELETED",
        }
    }

    fn for_event(event: DocumentEvent) -> Self {
        match event {
            DocumentEvent::Created => WarehouseActivityType::Created,
            DocumentEvent::Updated => WarehouseActivityType::Updated,
            DocumentEvent::LineAdded => WarehouseActivityType::MarkAdded,
            DocumentEvent::LineUpdated => WarehouseActivityType::MarkUpdated,
            DocumentEvent::LineDeleted => WarehouseActivityType::MarkDeleted,
            DocumentEvent::StatusChanged => WarehouseActivityType::StatusChange,
            DocumentEvent::Exported => WarehouseActivityType::Exported,
            DocumentEvent::Deleted => WarehouseActivityType::Deleted,
        }
    }
}

impl fmt::Display for WarehouseActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// DocumentActivityType - 单证通用活动类型
// ==========================================
// 分拨、发票、装箱单、收款表共用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentActivityType {
    Create,
    Update,
    LineAdded,
    LineUpdated,
    LineDeleted,
    StatusChange,
    Export,
    Delete,
}

impl ActivityVocabulary for DocumentActivityType {
    const ALL: &'static [Self] = &[
        DocumentActivityType::Create,
        DocumentActivityType::Update,
        DocumentActivityType::LineAdded,
        DocumentActivityType::LineUpdated,
        DocumentActivityType::LineDeleted,
        DocumentActivityType::StatusChange,
        DocumentActivityType::Export,
        DocumentActivityType::Delete,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            DocumentActivityType::Create => "CREATE",
            DocumentActivityType::Update => "UPDATE",
            DocumentActivityType::LineAdded => "LINE_ADDED",
            DocumentActivityType::LineUpdated => "LINE_UPDATED",
            DocumentActivityType::LineDeleted => "LINE_DELETED",
            DocumentActivityType::StatusChange => "STATUS_CHANGE",
            DocumentActivityType::Export => "EXPORT",
            DocumentActivityType::Delete => "DELETE",
        }
    }

    fn for_event(event: DocumentEvent) -> Self {
        match event {
            DocumentEvent::Created => DocumentActivityType::Create,
            DocumentEvent::Updated => DocumentActivityType::Update,
            DocumentEvent::LineAdded => DocumentActivityType::LineAdded,
            DocumentEvent::LineUpdated => DocumentActivityType::LineUpdated,
            DocumentEvent::LineDeleted => DocumentActivityType::LineDeleted,
            DocumentEvent::StatusChanged => DocumentActivityType::StatusChange,
            DocumentEvent::Exported => DocumentActivityType::Export,
            DocumentEvent::Deleted => DocumentActivityType::Delete,
        }
    }
}

impl fmt::Display for DocumentActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// ActivityRecord - 活动日志（读模型）
// ==========================================
/// 已落库的活动日志
///
/// - parent_id 为空表示容器级/已删除父实体的事件,此时 scope_ref 仍保留归属
/// - actor_name 在操作人缺失时为 "System"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord<V> {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub scope_ref: Option<String>,
    pub actor_id: Option<i64>,
    pub actor_name: String,
    pub actor_role: Option<String>,
    pub activity_type: V,
    pub old_value: Option<JsonValue>,
    pub new_value: Option<JsonValue>,
    pub note: Option<String>,
    pub batch_id: Option<String>,
    pub created_at: NaiveDateTime,
}

// ==========================================
// NewActivity - 待写入的活动日志
// ==========================================
#[derive(Debug, Clone)]
pub struct NewActivity<V> {
    pub parent_id: Option<i64>,
    pub scope_ref: Option<String>,
    pub actor_id: Option<i64>,
    pub activity_type: V,
    pub old_value: Option<JsonValue>,
    pub new_value: Option<JsonValue>,
    pub note: Option<String>,
    pub batch_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl<V: ActivityVocabulary> NewActivity<V> {
    /// 创建新的活动日志（时间戳取当前 UTC）
    pub fn new(activity_type: V, actor_id: Option<i64>) -> Self {
        Self {
            parent_id: None,
            scope_ref: None,
            actor_id,
            activity_type,
            old_value: None,
            new_value: None,
            note: None,
            batch_id: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn for_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_scope(mut self, scope_ref: impl Into<String>) -> Self {
        self.scope_ref = Some(scope_ref.into());
        self
    }

    /// 设置变更前快照 (转换为JSON)
    pub fn with_old<T: Serialize>(mut self, value: &T) -> serde_json::Result<Self> {
        self.old_value = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    /// 设置变更后快照 (转换为JSON)
    pub fn with_new<T: Serialize>(mut self, value: &T) -> serde_json::Result<Self> {
        self.new_value = Some(serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.filter(|n| !n.trim().is_empty());
        self
    }

    /// 归入同一批量操作: 共享 batch_id 与逻辑时间戳
    pub fn in_batch(mut self, batch_id: &str, at: NaiveDateTime) -> Self {
        self.batch_id = Some(batch_id.to_string());
        self.created_at = at;
        self
    }
}

// ==========================================
// BulkStatusOutcome - 批量改状态结果
// ==========================================
/// 全部成功才提交; 日志条数恒等于 updated_count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkStatusOutcome {
    pub updated_count: usize,
    pub batch_id: String,
    pub changed_at: NaiveDateTime,
}
