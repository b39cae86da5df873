use crate::db::format_ts;
use crate::domain::activity::{ActivityVocabulary, NewActivity};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

// ==========================================
// ActivityRepository - 活动日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActivityRepository<V> {
    conn: Arc<Mutex<Connection>>,
    table: String,
    _vocabulary: PhantomData<V>,
}

impl<V: ActivityVocabulary> ActivityRepository<V> {
    /// 创建活动日志仓储
    ///
    /// # 参数
    /// - `table`: 活动表名,如 loading_activity / warehouse_plan_activity
    pub fn new(conn: Arc<Mutex<Connection>>, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
            _vocabulary: PhantomData,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入活动日志（调用方负责事务）
    ///
    /// # 返回
    /// - `Ok(id)`: 新日志 id
    pub fn insert_tx(&self, conn: &Connection, activity: &NewActivity<V>) -> RepositoryResult<i64> {
        conn.execute(
            &format!(
                r#"
                INSERT INTO {} (
                    parent_id, scope_ref, actor_id, activity_type,
                    old_value, new_value, note, batch_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                self.table
            ),
            params![
                activity.parent_id,
                activity.scope_ref,
                activity.actor_id,
                activity.activity_type.as_str(),
                activity.old_value.as_ref().map(|v| v.to_string()),
                activity.new_value.as_ref().map(|v| v.to_string()),
                activity.note,
                activity.batch_id,
                format_ts(&activity.created_at),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// 单独写入一条日志（自带事务）
    pub fn insert(&self, activity: &NewActivity<V>) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let id = self.insert_tx(&tx, activity)?;
        tx.commit()?;
        Ok(id)
    }
}
