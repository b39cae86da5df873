// ==========================================
// 货代后台系统 - 导入层
// ==========================================
// 职责: CSV/Excel → 规范化行 → 装柜单录入
// 契约: 只产出 ShipmentRow 列表,录入逻辑与手工表单共用
// ==========================================

pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod shipment_importer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::{normalize_header, ShipmentFieldMapper};
pub use file_parser::{CsvParser, ExcelParser, FileParser, RawRecord, UniversalFileParser};
pub use shipment_importer::{ImportOutcome, ImportRequest, ShipmentImporter, ShipmentImporterImpl};
