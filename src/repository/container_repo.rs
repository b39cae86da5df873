// ==========================================
// 货代后台系统 - 集装箱/唛头数据仓储
// ==========================================
// 职责: container / shipping_mark / ctn_mark 三张字典表
// 语义: 按业务唯一键 upsert,首次引用时创建,正常流程不删除
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::shipment::{Container, CtnMark, ShippingMark};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

// ==========================================
// ContainerRepository - 集装箱仓储
// ==========================================
pub struct ContainerRepository;

impl ContainerRepository {
    // ==========================================
    // 事务内辅助函数
    // ==========================================
    // 接收 &Connection,Transaction 通过 Deref 传入即可

    pub fn find_by_code_tx(conn: &Connection, code: &str) -> RepositoryResult<Option<Container>> {
        let container = conn
            .query_row(
                "SELECT id, code, origin, created_at FROM container WHERE code = ?1",
                params![code],
                map_container_row,
            )
            .optional()?;
        Ok(container)
    }

    pub fn list_all_tx(conn: &Connection) -> RepositoryResult<Vec<Container>> {
        let mut stmt =
            conn.prepare("SELECT id, code, origin, created_at FROM container ORDER BY id")?;
        let rows = stmt.query_map([], map_container_row)?;
        let mut containers = Vec::new();
        for row in rows {
            containers.push(row?);
        }
        Ok(containers)
    }

    /// 按箱号 upsert
    ///
    /// 已存在的集装箱不覆盖 origin
    ///
    /// # 返回
    /// - Ok(Container): 新建或已存在的集装箱
    pub fn upsert_tx(
        conn: &Connection,
        code: &str,
        origin: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<Container> {
        conn.execute(
            "INSERT OR IGNORE INTO container (code, origin, created_at) VALUES (?1, ?2, ?3)",
            params![code, origin, format_ts(now)],
        )?;
        Self::find_by_code_tx(conn, code)?
            .ok_or_else(|| RepositoryError::not_found("Container", code))
    }
}

// ==========================================
// MarkRepository - 唛头/箱唛字典
// ==========================================
pub struct MarkRepository;

impl MarkRepository {
    /// 按名称 upsert 客户唛头
    pub fn upsert_shipping_mark_tx(
        conn: &Connection,
        name: &str,
        source: Option<&str>,
        now: &NaiveDateTime,
    ) -> RepositoryResult<ShippingMark> {
        conn.execute(
            "INSERT OR IGNORE INTO shipping_mark (name, source, created_at) VALUES (?1, ?2, ?3)",
            params![name, source, format_ts(now)],
        )?;
        let mark = conn.query_row(
            "SELECT id, name, source FROM shipping_mark WHERE name = ?1",
            params![name],
            |row| {
                Ok(ShippingMark {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    source: row.get(2)?,
                })
            },
        )?;
        Ok(mark)
    }

    /// 按名称 upsert 箱唛（首次使用时创建）
    pub fn upsert_ctn_mark_tx(
        conn: &Connection,
        name: &str,
        now: &NaiveDateTime,
    ) -> RepositoryResult<CtnMark> {
        conn.execute(
            "INSERT OR IGNORE INTO ctn_mark (name, created_at) VALUES (?1, ?2)",
            params![name, format_ts(now)],
        )?;
        let mark = conn.query_row(
            "SELECT id, name FROM ctn_mark WHERE name = ?1",
            params![name],
            |row| {
                Ok(CtnMark {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )?;
        Ok(mark)
    }
}

fn map_container_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Container> {
    Ok(Container {
        id: row.get(0)?,
        code: row.get(1)?,
        origin: row.get(2)?,
        created_at: parse_ts(3, &row.get::<_, String>(3)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn now() -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }

    #[test]
    fn test_upsert_keeps_first_origin() {
        let conn = open_in_memory().unwrap();
        let first = ContainerRepository::upsert_tx(&conn, "CONT-1", "CHINA", &now()).unwrap();
        let second = ContainerRepository::upsert_tx(&conn, "CONT-1", "VIETNAM", &now()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.origin, "CHINA");
    }

    #[test]
    fn test_marks_created_lazily_once() {
        let conn = open_in_memory().unwrap();
        let a = MarkRepository::upsert_ctn_mark_tx(&conn, "A1", &now()).unwrap();
        let b = MarkRepository::upsert_ctn_mark_tx(&conn, "A1", &now()).unwrap();
        assert_eq!(a, b);

        let m = MarkRepository::upsert_shipping_mark_tx(&conn, "ACME", Some("CHINA"), &now())
            .unwrap();
        assert_eq!(m.source.as_deref(), Some("CHINA"));
    }

    #[test]
    fn test_find_missing_container() {
        let conn = open_in_memory().unwrap();
        assert!(ContainerRepository::find_by_code_tx(&conn, "NOPE").unwrap().is_none());
    }
}
