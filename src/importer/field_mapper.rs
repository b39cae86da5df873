// ==========================================
// 货代后台系统 - 字段映射器
// ==========================================
// 职责: 上传文件表头 → ShipmentRow
// 表头匹配: 忽略大小写,去掉空格/下划线/标点后比较
// 数值列保持文本,由引擎宽松解析
// ==========================================

use crate::domain::shipment::{FieldValue, ShipmentRow};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRecord;
use std::collections::HashMap;

/// 标准字段 → 可接受的表头别名（已规范化）
const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("particular", &["particular", "particulars", "description", "item"]),
    ("item_no", &["itemno", "itemnumber"]),
    ("ctn_mark", &["ctnmark", "mark", "marks"]),
    ("ctn", &["ctn", "ctns", "cartons"]),
    ("pcs", &["pcs", "pieces"]),
    ("cbm", &["cbm"]),
    ("wt", &["wt", "weight"]),
    ("unit", &["unit"]),
    ("photo", &["photo"]),
];

/// 表头规范化: 小写 + 只保留字母数字
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShipmentFieldMapper;

impl ShipmentFieldMapper {
    /// 映射全部行
    ///
    /// # 返回
    /// - Err(MissingColumn): 找不到 particular 列
    pub fn map_records(&self, records: &[RawRecord]) -> ImportResult<Vec<ShipmentRow>> {
        let has_particular = records.iter().any(|row| {
            row.keys()
                .any(|k| Self::field_for_header(&normalize_header(k)) == Some("particular"))
        });
        if !records.is_empty() && !has_particular {
            return Err(ImportError::MissingColumn(
                "particular (description / item)".to_string(),
            ));
        }

        Ok(records.iter().map(|row| self.map_row(row)).collect())
    }

    /// 映射单行
    pub fn map_row(&self, row: &RawRecord) -> ShipmentRow {
        let fields = Self::index_fields(row);
        let text = |field: &str| fields.get(field).cloned();
        let number = |field: &str| fields.get(field).map(|v| FieldValue::Text(v.clone()));

        ShipmentRow {
            particular: text("particular").unwrap_or_default(),
            item_no: text("item_no"),
            ctn_mark: text("ctn_mark"),
            ctn: number("ctn"),
            pcs: number("pcs"),
            cbm: number("cbm"),
            wt: number("wt"),
            unit: text("unit"),
            photo: text("photo"),
        }
    }

    /// 标准字段 → 非空单元格文本（同一字段多列时取第一个非空值）
    fn index_fields(row: &RawRecord) -> HashMap<&'static str, String> {
        let mut headers: Vec<&String> = row.keys().collect();
        headers.sort();

        let mut fields = HashMap::new();
        for header in headers {
            let Some(field) = Self::field_for_header(&normalize_header(header)) else {
                continue;
            };
            let value = row[header].trim();
            if value.is_empty() {
                continue;
            }
            fields.entry(field).or_insert_with(|| value.to_string());
        }
        fields
    }

    fn field_for_header(normalized: &str) -> Option<&'static str> {
        FIELD_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&normalized))
            .map(|(field, _)| *field)
    }
}
