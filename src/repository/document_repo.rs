// ==========================================
// 货代后台系统 - 通用单证仓储
// ==========================================
// 表: <prefix>_record / <prefix>_line
// 父记录头与明细以 JSON 存储,分组键单独成列便于检索
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{format_ts, parse_ts};
use crate::domain::document::{
    DocumentFilters, DocumentKind, DocumentLine, DocumentRecord, LineRecord, RecordOf,
};
use crate::domain::types::StatusVocabulary;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::marker::PhantomData;

// ==========================================
// DocumentRepository - 单证仓储
// ==========================================
/// 只承载单证类型参数,全部操作为事务内关联函数
pub struct DocumentRepository<K>(PhantomData<K>);

impl<K: DocumentKind> DocumentRepository<K> {
    // ==========================================
    // 写入（事务内）
    // ==========================================

    /// 插入父记录
    ///
    /// # 返回
    /// - Ok(record_id)
    /// - Err(UniqueConstraintViolation): reference 重复
    pub fn insert_record_tx(
        conn: &Connection,
        reference: &str,
        container_code: Option<&str>,
        status: K::Status,
        header: &K::Header,
        created_by: Option<i64>,
        now: &NaiveDateTime,
    ) -> RepositoryResult<i64> {
        let ts = format_ts(now);
        conn.execute(
            &format!(
                r#"
                INSERT INTO {} (
                    reference, container_code, status, header_json,
                    created_by, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                "#,
                K::record_table()
            ),
            params![
                reference,
                container_code,
                status.as_str(),
                serde_json::to_string(header)?,
                created_by,
                ts,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_line_tx(
        conn: &Connection,
        record_id: i64,
        position: i64,
        line: &K::Line,
    ) -> RepositoryResult<i64> {
        conn.execute(
            &format!(
                "INSERT INTO {} (record_id, position, group_key, payload_json) VALUES (?1, ?2, ?3, ?4)",
                K::line_table()
            ),
            params![record_id, position, line.group_key(), serde_json::to_string(line)?],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_line_tx(conn: &Connection, line_id: i64, line: &K::Line) -> RepositoryResult<()> {
        let rows = conn.execute(
            &format!(
                "UPDATE {} SET group_key = ?2, payload_json = ?3 WHERE id = ?1",
                K::line_table()
            ),
            params![line_id, line.group_key(), serde_json::to_string(line)?],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found(&format!("{}Line", K::NAME), line_id));
        }
        Ok(())
    }

    pub fn delete_line_tx(conn: &Connection, line_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", K::line_table()),
            params![line_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found(&format!("{}Line", K::NAME), line_id));
        }
        Ok(())
    }

    pub fn next_position_tx(conn: &Connection, record_id: i64) -> RepositoryResult<i64> {
        let max: Option<i64> = conn.query_row(
            &format!("SELECT MAX(position) FROM {} WHERE record_id = ?1", K::line_table()),
            params![record_id],
            |row| row.get(0),
        )?;
        Ok(max.map_or(0, |p| p + 1))
    }

    pub fn update_header_tx(
        conn: &Connection,
        record_id: i64,
        header: &K::Header,
        now: &NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            &format!(
                "UPDATE {} SET header_json = ?2, updated_at = ?3 WHERE id = ?1",
                K::record_table()
            ),
            params![record_id, serde_json::to_string(header)?, format_ts(now)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found(K::NAME, record_id));
        }
        Ok(())
    }

    pub fn update_status_tx(
        conn: &Connection,
        record_id: i64,
        status: K::Status,
        now: &NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            &format!(
                "UPDATE {} SET status = ?2, updated_at = ?3 WHERE id = ?1",
                K::record_table()
            ),
            params![record_id, status.as_str(), format_ts(now)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found(K::NAME, record_id));
        }
        Ok(())
    }

    pub fn touch_tx(conn: &Connection, record_id: i64, now: &NaiveDateTime) -> RepositoryResult<()> {
        conn.execute(
            &format!("UPDATE {} SET updated_at = ?2 WHERE id = ?1", K::record_table()),
            params![record_id, format_ts(now)],
        )?;
        Ok(())
    }

    /// 删除父记录（明细与活动日志随外键级联）
    pub fn delete_record_tx(conn: &Connection, record_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", K::record_table()),
            params![record_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found(K::NAME, record_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询（事务内）
    // ==========================================

    fn record_select() -> String {
        format!(
            "SELECT id, reference, container_code, status, header_json, created_by, created_at, updated_at FROM {}",
            K::record_table()
        )
    }

    pub fn find_by_id_tx(conn: &Connection, record_id: i64) -> RepositoryResult<Option<RecordOf<K>>> {
        let sql = format!("{} WHERE id = ?1", Self::record_select());
        let record = conn
            .query_row(&sql, params![record_id], map_record_row::<K>)
            .optional()?;

        match record {
            None => Ok(None),
            Some(mut record) => {
                record.lines = Self::load_lines_tx(conn, record.id)?;
                Ok(Some(record))
            }
        }
    }

    pub fn find_line_tx(conn: &Connection, line_id: i64) -> RepositoryResult<Option<LineRecord<K::Line>>> {
        let sql = format!(
            "SELECT id, record_id, position, payload_json FROM {} WHERE id = ?1",
            K::line_table()
        );
        let line = conn
            .query_row(&sql, params![line_id], map_line_row::<K>)
            .optional()?;
        Ok(line)
    }

    pub fn load_lines_tx(conn: &Connection, record_id: i64) -> RepositoryResult<Vec<LineRecord<K::Line>>> {
        let sql = format!(
            "SELECT id, record_id, position, payload_json FROM {} WHERE record_id = ?1 ORDER BY position, id",
            K::line_table()
        );
        let mut stmt = conn.prepare(&sql)?;
        let lines = stmt
            .query_map(params![record_id], map_line_row::<K>)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    /// 分页列表（最新创建在前）
    ///
    /// # 返回
    /// - Ok((当前页记录, 过滤后的总数))
    pub fn list_page_tx(
        conn: &Connection,
        filters: &DocumentFilters<K::Status>,
        limit: u32,
        offset: usize,
    ) -> RepositoryResult<(Vec<RecordOf<K>>, usize)> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = filters.status {
            args.push(Box::new(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", args.len()));
        }
        if let Some(code) = filters.container_code.as_deref() {
            args.push(Box::new(code.to_string()));
            clauses.push(format!("container_code = ?{}", args.len()));
        }
        if let Some(term) = filters
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            args.push(Box::new(term.to_lowercase()));
            let n = args.len();
            clauses.push(format!(
                "(instr(lower(reference), ?{n}) > 0 OR EXISTS (SELECT 1 FROM {line} l WHERE l.record_id = {record}.id AND instr(lower(l.group_key), ?{n}) > 0))",
                n = n,
                line = K::line_table(),
                record = K::record_table(),
            ));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let arg_refs: Vec<&dyn ToSql> = args.iter().map(|a| a.as_ref()).collect();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} {}", K::record_table(), where_clause),
            arg_refs.as_slice(),
            |row| row.get(0),
        )?;

        let sql = format!(
            "{} {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            Self::record_select(),
            where_clause,
            limit,
            offset
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut records = stmt
            .query_map(arg_refs.as_slice(), map_record_row::<K>)?
            .collect::<SqliteResult<Vec<_>>>()?;

        for record in records.iter_mut() {
            record.lines = Self::load_lines_tx(conn, record.id)?;
        }

        Ok((records, total.max(0) as usize))
    }
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn map_record_row<K: DocumentKind>(row: &Row<'_>) -> SqliteResult<RecordOf<K>> {
    let raw_status: String = row.get(3)?;
    let status = K::Status::parse(&raw_status).ok_or_else(|| {
        conversion_error(3, format!("未知{}状态: {}", K::Status::VOCABULARY, raw_status))
    })?;
    let header_json: String = row.get(4)?;
    let header: K::Header = serde_json::from_str(&header_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(DocumentRecord {
        id: row.get(0)?,
        reference: row.get(1)?,
        container_code: row.get(2)?,
        status,
        header,
        created_by: row.get(5)?,
        created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
        updated_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        lines: Vec::new(),
    })
}

fn map_line_row<K: DocumentKind>(row: &Row<'_>) -> SqliteResult<LineRecord<K::Line>> {
    let payload: String = row.get(3)?;
    let line: K::Line = serde_json::from_str(&payload)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(LineRecord {
        id: row.get(0)?,
        record_id: row.get(1)?,
        position: row.get(2)?,
        line,
    })
}
