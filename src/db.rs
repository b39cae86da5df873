// ==========================================
// 货代后台系统 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为(外键/busy_timeout)
// - 统一时间戳/日期的文本格式
// - 幂等建表,记录 schema_version
// ==========================================

use crate::domain::document::DocumentKind;
use crate::domain::modules::{
    AccountingSheet, Bifurcation, CommercialInvoice, PackingList, WarehousePlan,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式（UTC,毫秒）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 日期存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开内存库并建表（测试/演示用）
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure_sqlite_connection(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

// ==========================================
// 建表
// ==========================================

/// 幂等初始化全部表结构
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS app_user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            role TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS container (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            origin TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS shipping_mark (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            source TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ctn_mark (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        -- container / shipping_mark 不级联: 被装柜单引用时禁止删除
        CREATE TABLE IF NOT EXISTS loading_sheet (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            container_id INTEGER NOT NULL REFERENCES container(id),
            shipping_mark_id INTEGER NOT NULL REFERENCES shipping_mark(id),
            loading_date TEXT NOT NULL,
            status TEXT NOT NULL,
            created_by INTEGER REFERENCES app_user(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_loading_sheet_container ON loading_sheet(container_id);

        CREATE TABLE IF NOT EXISTS loading_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sheet_id INTEGER NOT NULL REFERENCES loading_sheet(id) ON DELETE CASCADE,
            ctn_mark_id INTEGER NOT NULL REFERENCES ctn_mark(id),
            position INTEGER NOT NULL,
            particular TEXT NOT NULL,
            item_no TEXT,
            ctn INTEGER NOT NULL CHECK (ctn >= 0),
            pcs INTEGER NOT NULL,
            tpcs INTEGER NOT NULL,
            cbm REAL NOT NULL,
            tcbm REAL NOT NULL,
            wt REAL NOT NULL,
            twt REAL NOT NULL,
            unit TEXT,
            photo TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_loading_item_sheet ON loading_item(sheet_id);
        "#,
    )?;

    create_activity_table(conn, "loading_activity", "loading_sheet")?;

    create_document_tables::<Bifurcation>(conn)?;
    create_document_tables::<WarehousePlan>(conn)?;
    create_document_tables::<CommercialInvoice>(conn)?;
    create_document_tables::<PackingList>(conn)?;
    create_document_tables::<AccountingSheet>(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 活动日志表
///
/// parent_id 随父记录级联删除; 父记录删除前写入的 DELETE 日志 parent_id 为空,
/// 仅通过 scope_ref 归属,因此得以保留
fn create_activity_table(conn: &Connection, table: &str, parent_table: &str) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER REFERENCES {parent_table}(id) ON DELETE CASCADE,
            scope_ref TEXT,
            actor_id INTEGER REFERENCES app_user(id),
            activity_type TEXT NOT NULL,
            old_value TEXT,
            new_value TEXT,
            note TEXT,
            batch_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}(parent_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_{table}_scope ON {table}(scope_ref, created_at);
        "#,
    ))
}

/// 通用单证模块的三张表
fn create_document_tables<K: DocumentKind>(conn: &Connection) -> rusqlite::Result<()> {
    let record = K::record_table();
    let line = K::line_table();

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {record} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reference TEXT NOT NULL UNIQUE,
            container_code TEXT,
            status TEXT NOT NULL,
            header_json TEXT NOT NULL,
            created_by INTEGER REFERENCES app_user(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{record}_container ON {record}(container_code);

        CREATE TABLE IF NOT EXISTS {line} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id INTEGER NOT NULL REFERENCES {record}(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            group_key TEXT NOT NULL,
            payload_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{line}_record ON {line}(record_id);
        "#,
    ))?;

    create_activity_table(conn, &K::activity_table(), &record)
}

// ==========================================
// 时间格式辅助
// ==========================================

pub fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// 解析时间戳列（兼容不带毫秒的历史数据）
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
