// ==========================================
// 货代后台系统 - 操作人仓储
// ==========================================
// 用户由认证层维护,核心只需要 id → (name, role) 的展示映射
// ==========================================

use crate::domain::shipment::User;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建用户
    pub fn create(&self, name: &str, role: Option<&str>) -> RepositoryResult<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RepositoryError::ValidationError("用户名不能为空".to_string()));
        }

        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO app_user (name, role) VALUES (?1, ?2)",
            params![name, role],
        )?;
        Ok(User {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            role: role.map(str::to_string),
        })
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, id)
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<User>> {
        let user = conn
            .query_row(
                "SELECT id, name, role FROM app_user WHERE id = ?1",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        role: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// 校验操作人引用（None 表示系统操作,总是合法）
    pub fn ensure_actor_tx(conn: &Connection, actor_id: Option<i64>) -> RepositoryResult<()> {
        match actor_id {
            None => Ok(()),
            Some(id) => match Self::find_by_id_tx(conn, id)? {
                Some(_) => Ok(()),
                None => Err(RepositoryError::not_found("User", id)),
            },
        }
    }
}
