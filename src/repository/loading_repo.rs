// ==========================================
// 货代后台系统 - 装柜单数据仓储
// ==========================================
// 职责: loading_sheet / loading_item 的 CRUD
// 红线: Repository 不含业务逻辑,t 字段由调用方算好后写入
// ==========================================

use crate::db::{format_date, format_ts, parse_date, parse_ts};
use crate::domain::shipment::{ItemDraft, LoadingItem, LoadingSheet};
use crate::domain::types::{ShipmentStatus, StatusVocabulary};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

const SHEET_SELECT: &str = r#"
    SELECT s.id, s.container_id, c.code, s.shipping_mark_id, m.name,
           s.loading_date, s.status, s.created_at, s.updated_at
    FROM loading_sheet s
    JOIN container c ON c.id = s.container_id
    JOIN shipping_mark m ON m.id = s.shipping_mark_id
"#;

const ITEM_SELECT: &str = r#"
    SELECT i.id, i.sheet_id, i.ctn_mark_id, k.name, i.particular, i.item_no,
           i.ctn, i.pcs, i.tpcs, i.cbm, i.tcbm, i.wt, i.twt, i.unit, i.photo
    FROM loading_item i
    JOIN ctn_mark k ON k.id = i.ctn_mark_id
    JOIN loading_sheet s ON s.id = i.sheet_id
"#;

// ==========================================
// LoadingSheetRepository - 装柜单仓储
// ==========================================
pub struct LoadingSheetRepository;

impl LoadingSheetRepository {
    // ==========================================
    // 写入（事务内）
    // ==========================================

    /// 插入装柜单头
    ///
    /// # 返回
    /// - Ok(sheet_id)
    pub fn insert_sheet_tx(
        conn: &Connection,
        container_id: i64,
        shipping_mark_id: i64,
        loading_date: &NaiveDate,
        status: ShipmentStatus,
        created_by: Option<i64>,
        now: &NaiveDateTime,
    ) -> RepositoryResult<i64> {
        let ts = format_ts(now);
        conn.execute(
            r#"
            INSERT INTO loading_sheet (
                container_id, shipping_mark_id, loading_date, status,
                created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
            params![
                container_id,
                shipping_mark_id,
                format_date(loading_date),
                status.as_str(),
                created_by,
                ts,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 插入一条明细
    pub fn insert_item_tx(
        conn: &Connection,
        sheet_id: i64,
        ctn_mark_id: i64,
        position: i64,
        item: &ItemDraft,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO loading_item (
                sheet_id, ctn_mark_id, position, particular, item_no,
                ctn, pcs, tpcs, cbm, tcbm, wt, twt, unit, photo
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                sheet_id,
                ctn_mark_id,
                position,
                item.particular,
                item.item_no,
                item.ctn,
                item.pcs,
                item.tpcs,
                item.cbm,
                item.tcbm,
                item.wt,
                item.twt,
                item.unit,
                item.photo,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 覆写一条明细
    pub fn update_item_tx(
        conn: &Connection,
        item_id: i64,
        ctn_mark_id: i64,
        item: &ItemDraft,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE loading_item SET
                ctn_mark_id = ?2, particular = ?3, item_no = ?4,
                ctn = ?5, pcs = ?6, tpcs = ?7, cbm = ?8, tcbm = ?9,
                wt = ?10, twt = ?11, unit = ?12, photo = ?13
            WHERE id = ?1
            "#,
            params![
                item_id,
                ctn_mark_id,
                item.particular,
                item.item_no,
                item.ctn,
                item.pcs,
                item.tpcs,
                item.cbm,
                item.tcbm,
                item.wt,
                item.twt,
                item.unit,
                item.photo,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("LoadingItem", item_id));
        }
        Ok(())
    }

    pub fn delete_item_tx(conn: &Connection, item_id: i64) -> RepositoryResult<()> {
        let rows = conn.execute("DELETE FROM loading_item WHERE id = ?1", params![item_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("LoadingItem", item_id));
        }
        Ok(())
    }

    /// 下一条明细的序号
    pub fn next_position_tx(conn: &Connection, sheet_id: i64) -> RepositoryResult<i64> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(position) FROM loading_item WHERE sheet_id = ?1",
            params![sheet_id],
            |row| row.get(0),
        )?;
        Ok(max.map_or(0, |p| p + 1))
    }

    pub fn update_status_tx(
        conn: &Connection,
        sheet_id: i64,
        status: ShipmentStatus,
        now: &NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE loading_sheet SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![sheet_id, status.as_str(), format_ts(now)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("LoadingSheet", sheet_id));
        }
        Ok(())
    }

    /// 更新装柜日期与唛头
    pub fn update_fields_tx(
        conn: &Connection,
        sheet_id: i64,
        loading_date: &NaiveDate,
        shipping_mark_id: i64,
        now: &NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE loading_sheet
            SET loading_date = ?2, shipping_mark_id = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
            params![sheet_id, format_date(loading_date), shipping_mark_id, format_ts(now)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("LoadingSheet", sheet_id));
        }
        Ok(())
    }

    /// 仅刷新 updated_at（明细变动时）
    pub fn touch_tx(conn: &Connection, sheet_id: i64, now: &NaiveDateTime) -> RepositoryResult<()> {
        conn.execute(
            "UPDATE loading_sheet SET updated_at = ?2 WHERE id = ?1",
            params![sheet_id, format_ts(now)],
        )?;
        Ok(())
    }

    /// 删除装柜单: 先删明细,再删单头
    ///
    /// # 返回
    /// - Ok(删除的明细条数)
    pub fn delete_sheet_tx(conn: &Connection, sheet_id: i64) -> RepositoryResult<usize> {
        let items = conn.execute("DELETE FROM loading_item WHERE sheet_id = ?1", params![sheet_id])?;
        let rows = conn.execute("DELETE FROM loading_sheet WHERE id = ?1", params![sheet_id])?;
        if rows == 0 {
            return Err(RepositoryError::not_found("LoadingSheet", sheet_id));
        }
        Ok(items)
    }

    // ==========================================
    // 查询（事务内）
    // ==========================================

    pub fn find_by_id_tx(conn: &Connection, sheet_id: i64) -> RepositoryResult<Option<LoadingSheet>> {
        let sql = format!("{} WHERE s.id = ?1", SHEET_SELECT);
        let sheet = conn
            .query_row(&sql, params![sheet_id], map_sheet_row)
            .optional()?;

        match sheet {
            None => Ok(None),
            Some(mut sheet) => {
                sheet.items = Self::load_items(conn, "WHERE i.sheet_id = ?1", &[&sheet_id])?
                    .remove(&sheet_id)
                    .unwrap_or_default();
                Ok(Some(sheet))
            }
        }
    }

    pub fn list_by_container_tx(
        conn: &Connection,
        container_id: i64,
    ) -> RepositoryResult<Vec<LoadingSheet>> {
        let sql = format!("{} WHERE s.container_id = ?1 ORDER BY s.id", SHEET_SELECT);
        let sheets = Self::load_sheets(conn, &sql, &[&container_id])?;
        let items = Self::load_items(conn, "WHERE s.container_id = ?1", &[&container_id])?;
        Ok(attach_items(sheets, items))
    }

    /// 全部装柜单（集装箱看板用,一次读取）
    pub fn list_all_tx(conn: &Connection) -> RepositoryResult<Vec<LoadingSheet>> {
        let sql = format!("{} ORDER BY s.id", SHEET_SELECT);
        let sheets = Self::load_sheets(conn, &sql, &[])?;
        let items = Self::load_items(conn, "", &[])?;
        Ok(attach_items(sheets, items))
    }

    pub fn find_item_tx(conn: &Connection, item_id: i64) -> RepositoryResult<Option<LoadingItem>> {
        let sql = format!("{} WHERE i.id = ?1", ITEM_SELECT);
        let item = conn
            .query_row(&sql, params![item_id], map_item_row)
            .optional()?;
        Ok(item)
    }

    /// 集装箱下全部装柜单 id（按插入顺序）
    pub fn list_ids_by_container_tx(conn: &Connection, container_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt = conn.prepare("SELECT id FROM loading_sheet WHERE container_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![container_id], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn load_sheets(
        conn: &Connection,
        sql: &str,
        args: &[&dyn ToSql],
    ) -> RepositoryResult<Vec<LoadingSheet>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, map_sheet_row)?;
        let mut sheets = Vec::new();
        for row in rows {
            sheets.push(row?);
        }
        Ok(sheets)
    }

    /// 读取明细并按 sheet_id 分桶（桶内按 position, id 排序）
    fn load_items(
        conn: &Connection,
        where_clause: &str,
        args: &[&dyn ToSql],
    ) -> RepositoryResult<HashMap<i64, Vec<LoadingItem>>> {
        let sql = format!("{} {} ORDER BY i.sheet_id, i.position, i.id", ITEM_SELECT, where_clause);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args, map_item_row)?;

        let mut by_sheet: HashMap<i64, Vec<LoadingItem>> = HashMap::new();
        for row in rows {
            let item = row?;
            by_sheet.entry(item.sheet_id).or_default().push(item);
        }
        Ok(by_sheet)
    }
}

fn attach_items(
    mut sheets: Vec<LoadingSheet>,
    mut items: HashMap<i64, Vec<LoadingItem>>,
) -> Vec<LoadingSheet> {
    for sheet in sheets.iter_mut() {
        sheet.items = items.remove(&sheet.id).unwrap_or_default();
    }
    sheets
}

fn map_sheet_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoadingSheet> {
    let raw_status: String = row.get(6)?;
    let status = ShipmentStatus::parse(&raw_status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            Type::Text,
            format!("未知装柜状态: {}", raw_status).into(),
        )
    })?;

    Ok(LoadingSheet {
        id: row.get(0)?,
        container_id: row.get(1)?,
        container_code: row.get(2)?,
        shipping_mark_id: row.get(3)?,
        shipping_mark: row.get(4)?,
        loading_date: parse_date(5, &row.get::<_, String>(5)?)?,
        status,
        created_at: parse_ts(7, &row.get::<_, String>(7)?)?,
        updated_at: parse_ts(8, &row.get::<_, String>(8)?)?,
        items: Vec::new(),
    })
}

fn map_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoadingItem> {
    Ok(LoadingItem {
        id: row.get(0)?,
        sheet_id: row.get(1)?,
        ctn_mark_id: row.get(2)?,
        ctn_mark: row.get(3)?,
        particular: row.get(4)?,
        item_no: row.get(5)?,
        ctn: row.get(6)?,
        pcs: row.get(7)?,
        tpcs: row.get(8)?,
        cbm: row.get(9)?,
        tcbm: row.get(10)?,
        wt: row.get(11)?,
        twt: row.get(12)?,
        unit: row.get(13)?,
        photo: row.get(14)?,
    })
}
