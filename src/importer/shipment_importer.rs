// ==========================================
// 货代后台系统 - 装柜明细导入
// ==========================================
// 流程: 文件解析 → 字段映射 → ShipmentApi::ingest_shipment（原样调用）
// 说明: 解析与落库都是阻塞操作,放进 spawn_blocking
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::shipment_api::ShipmentApi;
use crate::domain::shipment::LoadingSheet;
use crate::importer::error::ImportError;
use crate::importer::field_mapper::ShipmentFieldMapper;
use crate::importer::file_parser::{FileParser, UniversalFileParser};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

// ==========================================
// ImportRequest / ImportOutcome
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub file_path: PathBuf,
    pub container_code: String,
    pub shipping_mark: String,
    pub loading_date: NaiveDate,
    /// None 时取配置 import.default_origin
    pub origin: Option<String>,
    pub actor_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub batch_id: String,
    pub file_path: PathBuf,
    pub row_count: usize,
    pub elapsed_ms: u64,
    pub sheet: LoadingSheet,
}

// ==========================================
// ShipmentImporter Trait
// ==========================================
#[async_trait]
pub trait ShipmentImporter: Send + Sync {
    /// 导入单个文件,生成一张装柜单
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 新装柜单 + 行数 + 耗时
    /// - Err(ImportError): 文件/格式/表头错误
    /// - Err(ValidationError 等): 与手工录入相同的校验
    async fn import_file(&self, request: ImportRequest) -> ApiResult<ImportOutcome>;

    /// 批量导入多个文件（并发执行）
    ///
    /// 每个文件独立成一张装柜单,某个文件失败不影响其他文件
    async fn batch_import(&self, requests: Vec<ImportRequest>) -> Vec<Result<ImportOutcome, String>>;
}

// ==========================================
// ShipmentImporterImpl
// ==========================================
pub struct ShipmentImporterImpl {
    api: Arc<ShipmentApi>,
    parser: Arc<dyn FileParser>,
    mapper: ShipmentFieldMapper,
}

impl ShipmentImporterImpl {
    pub fn new(api: Arc<ShipmentApi>) -> Self {
        Self::with_parser(api, Arc::new(UniversalFileParser))
    }

    pub fn with_parser(api: Arc<ShipmentApi>, parser: Arc<dyn FileParser>) -> Self {
        Self {
            api,
            parser,
            mapper: ShipmentFieldMapper,
        }
    }

    /// 同步导入（在阻塞线程中执行）
    fn import_blocking(
        api: &ShipmentApi,
        parser: &dyn FileParser,
        mapper: ShipmentFieldMapper,
        request: &ImportRequest,
    ) -> ApiResult<(LoadingSheet, usize)> {
        let records = parser.parse_to_raw_records(&request.file_path)?;
        if records.is_empty() {
            return Err(ImportError::NoDataRows(request.file_path.display().to_string()).into());
        }
        let rows = mapper.map_records(&records)?;

        let sheet = api.ingest_shipment(
            &request.container_code,
            request.origin.as_deref().unwrap_or(""),
            &request.shipping_mark,
            request.loading_date,
            &rows,
            request.actor_id,
        )?;
        Ok((sheet, rows.len()))
    }
}

#[async_trait]
impl ShipmentImporter for ShipmentImporterImpl {
    async fn import_file(&self, request: ImportRequest) -> ApiResult<ImportOutcome> {
        let start_time = Instant::now();
        let batch_id = uuid::Uuid::new_v4().to_string();
        info!(
            batch_id = %batch_id,
            file = %request.file_path.display(),
            container_code = %request.container_code,
            "开始导入装柜明细"
        );

        let api = self.api.clone();
        let parser = self.parser.clone();
        let mapper = self.mapper;
        let task_request = request.clone();
        let (sheet, row_count) = tokio::task::spawn_blocking(move || {
            Self::import_blocking(&api, parser.as_ref(), mapper, &task_request)
        })
        .await
        .map_err(|e| ApiError::InternalError(format!("导入任务异常终止: {}", e)))??;

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            batch_id = %batch_id,
            sheet_id = sheet.id,
            row_count,
            elapsed_ms,
            "装柜明细导入完成"
        );

        Ok(ImportOutcome {
            batch_id,
            file_path: request.file_path,
            row_count,
            elapsed_ms,
            sheet,
        })
    }

    async fn batch_import(&self, requests: Vec<ImportRequest>) -> Vec<Result<ImportOutcome, String>> {
        use futures::future::join_all;

        info!(count = requests.len(), "开始批量导入文件");

        let import_tasks = requests.into_iter().map(|request| {
            let path_str = request.file_path.display().to_string();
            async move {
                match self.import_file(request).await {
                    Ok(outcome) => Ok(outcome),
                    Err(e) => {
                        error!(file = %path_str, error = %e, "文件导入失败");
                        Err(format!("文件 {} 导入失败: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );
        results
    }
}
