use super::core::ActivityRepository;
use crate::db::parse_ts;
use crate::domain::activity::{ActivityRecord, ActivityVocabulary, SYSTEM_ACTOR_NAME};
use crate::repository::error::RepositoryResult;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use serde_json::Value as JsonValue;

impl<V: ActivityVocabulary> ActivityRepository<V> {
    // ==========================================
    // 查询操作
    // ==========================================
    // 排序: id DESC; 自增 id 即写入顺序,不依赖系统时钟单调

    fn select_sql(&self, where_clause: &str) -> String {
        format!(
            r#"
            SELECT a.id, a.parent_id, a.scope_ref, a.actor_id, u.name, u.role,
                   a.activity_type, a.old_value, a.new_value, a.note, a.batch_id, a.created_at
            FROM {} a
            LEFT JOIN app_user u ON u.id = a.actor_id
            {}
            ORDER BY a.id DESC
            LIMIT ?2
            "#,
            self.table(),
            where_clause
        )
    }

    /// 按 id 查询单条日志
    pub fn find_by_id_tx(&self, conn: &Connection, id: i64) -> RepositoryResult<Option<ActivityRecord<V>>> {
        let sql = format!(
            r#"
            SELECT a.id, a.parent_id, a.scope_ref, a.actor_id, u.name, u.role,
                   a.activity_type, a.old_value, a.new_value, a.note, a.batch_id, a.created_at
            FROM {} a
            LEFT JOIN app_user u ON u.id = a.actor_id
            WHERE a.id = ?1
            "#,
            self.table()
        );
        let record = conn.query_row(&sql, params![id], map_row::<V>).optional()?;
        Ok(record)
    }

    /// 查询父实体的日志（最新在前）
    pub fn list_by_parent_tx(
        &self,
        conn: &Connection,
        parent_id: i64,
        limit: u32,
    ) -> RepositoryResult<Vec<ActivityRecord<V>>> {
        let mut stmt = conn.prepare(&self.select_sql("WHERE a.parent_id = ?1"))?;
        let logs = stmt
            .query_map(params![parent_id, limit], map_row::<V>)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn list_by_parent(&self, parent_id: i64, limit: u32) -> RepositoryResult<Vec<ActivityRecord<V>>> {
        let conn = self.get_conn()?;
        self.list_by_parent_tx(&conn, parent_id, limit)
    }

    /// 按归属范围查询（含父实体已删除的日志）
    pub fn list_by_scope(&self, scope_ref: &str, limit: u32) -> RepositoryResult<Vec<ActivityRecord<V>>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&self.select_sql("WHERE a.scope_ref = ?1"))?;
        let logs = stmt
            .query_map(params![scope_ref, limit], map_row::<V>)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 同一批量操作写入的日志
    pub fn list_by_batch(&self, batch_id: &str) -> RepositoryResult<Vec<ActivityRecord<V>>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&self.select_sql("WHERE a.batch_id = ?1"))?;
        let logs = stmt
            .query_map(params![batch_id, i64::MAX], map_row::<V>)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn count_by_parent(&self, parent_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE parent_id = ?1", self.table()),
            params![parent_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn parse_json(idx: usize, raw: Option<String>) -> SqliteResult<Option<JsonValue>> {
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn map_row<V: ActivityVocabulary>(row: &Row<'_>) -> SqliteResult<ActivityRecord<V>> {
    let raw_type: String = row.get(6)?;
    let activity_type = V::parse(&raw_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("未知活动类型: {}", raw_type).into(),
        )
    })?;

    Ok(ActivityRecord {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        scope_ref: row.get(2)?,
        actor_id: row.get(3)?,
        actor_name: row
            .get::<_, Option<String>>(4)?
            .unwrap_or_else(|| SYSTEM_ACTOR_NAME.to_string()),
        actor_role: row.get(5)?,
        activity_type,
        old_value: parse_json(7, row.get(7)?)?,
        new_value: parse_json(8, row.get(8)?)?,
        note: row.get(9)?,
        batch_id: row.get(10)?,
        created_at: parse_ts(11, &row.get::<_, String>(11)?)?,
    })
}
