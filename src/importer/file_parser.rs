// ==========================================
// 货代后台系统 - 文件解析器
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 每行一个 HashMap<表头, 单元格文本>,完全空白的行跳过
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Reader};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// 原始行记录
pub type RawRecord = HashMap<String, String>;

// ==========================================
// FileParser Trait
// ==========================================
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行记录
    ///
    /// # 返回
    /// - Ok(Vec<RawRecord>): 行记录列表（可能为空）
    /// - Err: 文件不存在 / 格式不支持 / 解析失败
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRecord>>;
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// 按表头组装一行,完全空白返回 None
fn build_record(headers: &[String], cells: impl Iterator<Item = String>) -> Option<RawRecord> {
    let mut row_map = HashMap::new();
    for (header, value) in headers.iter().zip(cells) {
        if header.is_empty() {
            continue;
        }
        row_map.insert(header.clone(), value.trim().to_string());
    }

    if row_map.values().all(|v| v.is_empty()) {
        None
    } else {
        Some(row_map)
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRecord>> {
        ensure_exists(file_path)?;
        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            if let Some(row) = build_record(&headers, record.iter().map(str::to_string)) {
                records.push(row);
            }
        }

        Ok(records)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
// 只读取第一个工作表,第一行为表头
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRecord>> {
        ensure_exists(file_path)?;
        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook = open_workbook_auto(file_path)?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        let mut rows = range.rows();
        let header_row = match rows.next() {
            Some(row) => row,
            None => return Ok(Vec::new()),
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut records = Vec::new();
        for data_row in rows {
            if let Some(row) = build_record(&headers, data_row.iter().map(|c| c.to_string())) {
                records.push(row);
            }
        }

        Ok(records)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<RawRecord>> {
        match extension_of(file_path).as_str() {
            "csv" => CsvParser.parse_to_raw_records(file_path),
            "xlsx" | "xls" => ExcelParser.parse_to_raw_records(file_path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        write!(temp_file, "{}", content).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_csv_parser_valid_file() {
        let file = csv_file("Particular, CTN ,PCS\nWidget,10,5\n,,\nGadget,2,1\n");
        let records = CsvParser.parse_to_raw_records(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Particular").map(String::as_str), Some("Widget"));
        assert_eq!(records[0].get("CTN").map(String::as_str), Some("10"));
        assert_eq!(records[1].get("PCS").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_csv_parser_short_rows_allowed() {
        let file = csv_file("particular,ctn,pcs\nWidget,3\n");
        let records = CsvParser.parse_to_raw_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].get("pcs").is_none());
    }

    #[test]
    fn test_file_not_found() {
        let err = UniversalFileParser
            .parse_to_raw_records(Path::new("/nonexistent/rows.csv"))
            .unwrap_err();
        assert!(matches!(err, ImportError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let file = Builder::new().suffix(".pdf").tempfile().unwrap();
        let err = UniversalFileParser.parse_to_raw_records(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::UnsupportedFormat(ext) if ext == "pdf"));
    }

    #[test]
    fn test_invalid_excel_reports_parse_error() {
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        write!(file, "not a zip archive").unwrap();
        file.flush().unwrap();
        let err = ExcelParser.parse_to_raw_records(file.path()).unwrap_err();
        assert!(matches!(err, ImportError::ExcelParseError(_)));
    }
}
