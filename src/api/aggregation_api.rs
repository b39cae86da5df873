// ==========================================
// 货代后台系统 - 汇总查询 API
// ==========================================
// 职责: 一次快照读取 → 纯函数汇总
// 说明: 不缓存,每次调用从头计算; 读事务结束后即回滚
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::lock_conn;
use crate::config::ConfigManager;
use crate::domain::aggregation::{AggregateFilters, ContainerAggregate, ContainerPage};
use crate::engine::aggregation::{aggregate_container, summarize_containers};
use crate::repository::{ContainerRepository, LoadingSheetRepository};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct AggregationApi {
    conn: Arc<Mutex<Connection>>,
    config: Arc<ConfigManager>,
}

impl AggregationApi {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self { conn, config }
    }

    /// 单个集装箱的分客户汇总
    ///
    /// # 返回
    /// - Ok: 过滤后无数据时返回空分组 + 零总计
    /// - Err(NotFound): 箱号不存在
    pub fn aggregate_container(
        &self,
        container_code: &str,
        filters: &AggregateFilters,
    ) -> ApiResult<ContainerAggregate> {
        let conn = lock_conn(&self.conn)?;
        let snapshot = conn.unchecked_transaction()?;

        let container = ContainerRepository::find_by_code_tx(&snapshot, container_code.trim())?
            .ok_or_else(|| ApiError::not_found("Container", container_code))?;
        let sheets = LoadingSheetRepository::list_by_container_tx(&snapshot, container.id)?;
        drop(snapshot);

        let aggregate = aggregate_container(&container, &sheets, filters);
        debug!(
            container_code = %container.code,
            sheet_count = sheets.len(),
            client_count = aggregate.per_client.len(),
            "集装箱汇总完成"
        );
        Ok(aggregate)
    }

    /// 集装箱看板（分页）
    ///
    /// # 参数
    /// - `page`: 从 1 开始,0 按 1 处理
    /// - `limit`: 0 取配置默认值,超过上限时截断
    pub fn aggregate_containers_list(
        &self,
        filters: &AggregateFilters,
        page: u32,
        limit: u32,
    ) -> ApiResult<ContainerPage> {
        let limit = self.resolve_limit(limit)?;
        let page = page.max(1);

        let conn = lock_conn(&self.conn)?;
        let snapshot = conn.unchecked_transaction()?;
        let containers = ContainerRepository::list_all_tx(&snapshot)?;
        let sheets = LoadingSheetRepository::list_all_tx(&snapshot)?;
        drop(snapshot);

        let result = summarize_containers(&containers, &sheets, filters, page, limit);
        debug!(
            page,
            limit,
            total = result.pagination.total,
            "集装箱列表汇总完成"
        );
        Ok(result)
    }

    fn resolve_limit(&self, limit: u32) -> ApiResult<u32> {
        let map_err = |e: Box<dyn std::error::Error>| ApiError::InternalError(e.to_string());
        let max = self.config.get_max_page_size().map_err(map_err)?.max(1);
        let limit = if limit == 0 {
            self.config.get_default_page_size().map_err(map_err)?
        } else {
            limit
        };
        Ok(limit.clamp(1, max))
    }
}
