// ==========================================
// 货代后台系统 - 应用状态
// ==========================================
// 职责: 打开共享连接,装配仓储/引擎/API
// 约束: 全部 API 共用同一个 Arc<Mutex<Connection>>
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ActivityApi, AggregationApi, DocumentApi, ShipmentApi, StatusApi};
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_in_memory, open_sqlite_connection};
use crate::domain::modules::{AccountingSheet, Bifurcation, CommercialInvoice, PackingList, WarehousePlan};
use crate::engine::lifecycle::{LifecycleManager, TransitionPolicy};
use crate::importer::ShipmentImporterImpl;
use crate::repository::UserRepository;

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径（内存库为 ":memory:"）
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 配置管理器
    pub config: Arc<ConfigManager>,

    /// 装柜单录入/修改
    pub shipment_api: Arc<ShipmentApi>,

    /// 汇总查询
    pub aggregation_api: Arc<AggregationApi>,

    /// 装柜单状态
    pub status_api: Arc<StatusApi>,

    /// 装柜单活动流
    pub activity_api: Arc<ActivityApi>,

    /// 文件导入
    pub importer: Arc<ShipmentImporterImpl>,

    // 通用单证模块
    pub bifurcation_api: Arc<DocumentApi<Bifurcation>>,
    pub warehouse_plan_api: Arc<DocumentApi<WarehousePlan>>,
    pub invoice_api: Arc<DocumentApi<CommercialInvoice>>,
    pub packing_list_api: Arc<DocumentApi<PackingList>>,
    pub accounting_api: Arc<DocumentApi<AccountingSheet>>,

    /// 操作人仓储
    pub user_repo: Arc<UserRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径,不存在时自动创建并建表
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        Self::from_connection(db_path, conn)
    }

    /// 内存库（测试/演示）
    pub fn in_memory() -> Result<Self, String> {
        let conn = open_in_memory().map_err(|e| format!("无法打开内存库: {}", e))?;
        Self::from_connection(":memory:".to_string(), conn)
    }

    fn from_connection(db_path: String, conn: Connection) -> Result<Self, String> {
        let conn = Arc::new(Mutex::new(conn));

        let config = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        // 现行策略: 不设迁移图
        let lifecycle = LifecycleManager::new(TransitionPolicy::Unrestricted);

        let shipment_api = Arc::new(ShipmentApi::new(conn.clone(), config.clone()));
        let importer = Arc::new(ShipmentImporterImpl::new(shipment_api.clone()));

        let state = Self {
            aggregation_api: Arc::new(AggregationApi::new(conn.clone(), config.clone())),
            status_api: Arc::new(StatusApi::new(conn.clone(), lifecycle)),
            activity_api: Arc::new(ActivityApi::new(conn.clone(), config.clone())),
            bifurcation_api: Arc::new(DocumentApi::new(conn.clone(), lifecycle, config.clone())),
            warehouse_plan_api: Arc::new(DocumentApi::new(conn.clone(), lifecycle, config.clone())),
            invoice_api: Arc::new(DocumentApi::new(conn.clone(), lifecycle, config.clone())),
            packing_list_api: Arc::new(DocumentApi::new(conn.clone(), lifecycle, config.clone())),
            accounting_api: Arc::new(DocumentApi::new(conn.clone(), lifecycle, config.clone())),
            user_repo: Arc::new(UserRepository::from_connection(conn.clone())),
            shipment_api,
            importer,
            config,
            conn,
            db_path,
        };

        tracing::info!("AppState初始化完成");
        Ok(state)
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 FREIGHT_BACKOFFICE_DB_PATH → 用户数据目录 → 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("FREIGHT_BACKOFFICE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./freight_backoffice.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("freight-backoffice");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("freight_backoffice.db");
        }
    }

    path.to_string_lossy().to_string()
}
