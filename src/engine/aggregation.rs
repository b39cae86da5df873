// ==========================================
// 货代后台系统 - 集装箱汇总引擎
// ==========================================
// 红线: 纯函数,输入为一次快照读取的装柜单,不缓存,不拼 SQL
// 红线: 组内累加不舍入,组合计输出时舍入 (CBM 3 位, 重量 2 位)
// 红线: 总计 = 各组舍入后合计之和再舍入,保证 Σ组 == 总计
// ==========================================
// 职责:
//   1. aggregate_container: 按客户唛头分组汇总
//   2. summarize_container / paginate_summaries: 集装箱看板
//   3. summarize_document: 通用单证分组汇总
// ==========================================

use crate::domain::aggregation::{
    AggregateFilters, ClientGroup, ContainerAggregate, ContainerPage, ContainerSummary,
    GroupTotals, OverallTotals, Pagination, SortKey,
};
use crate::domain::document::{DocumentLine, DocumentSummary, LineRecord, MeasureTotals};
use crate::domain::shipment::{Container, LoadingItem, LoadingSheet};
use crate::engine::numeric::{round2, round3};
use std::cmp::Ordering;
use std::collections::HashMap;

// ==========================================
// 累加器（不舍入）
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    ctn: i64,
    tpcs: i64,
    tcbm: f64,
    twt: f64,
    items: usize,
}

impl Accumulator {
    fn add_item(&mut self, item: &LoadingItem) {
        self.ctn = self.ctn.saturating_add(item.ctn);
        self.tpcs = self.tpcs.saturating_add(item.ctn.saturating_mul(item.pcs));
        self.tcbm += item.ctn as f64 * item.cbm;
        self.twt += item.ctn as f64 * item.wt;
        self.items += 1;
    }

    /// 并入一个已舍入的分组合计
    fn add_group(&mut self, totals: &GroupTotals) {
        self.ctn = self.ctn.saturating_add(totals.ctn);
        self.tpcs = self.tpcs.saturating_add(totals.tpcs);
        self.tcbm += totals.tcbm;
        self.twt += totals.twt;
        self.items += totals.item_count;
    }

    fn group_totals(&self) -> GroupTotals {
        GroupTotals {
            ctn: self.ctn,
            tpcs: self.tpcs,
            tcbm: round3(self.tcbm),
            twt: round2(self.twt),
            item_count: self.items,
        }
    }
}

// ==========================================
// 过滤
// ==========================================

/// 装柜单级过滤: status / 装柜日期区间（闭区间）
pub fn sheet_matches(sheet: &LoadingSheet, filters: &AggregateFilters) -> bool {
    filters.status.map_or(true, |s| sheet.status == s)
        && filters.date_from.map_or(true, |d| sheet.loading_date >= d)
        && filters.date_to.map_or(true, |d| sheet.loading_date <= d)
}

/// 明细级过滤: 搜索词 / ctn / 总重 / 总体积
///
/// `search` 须为已小写化的搜索词
pub fn item_matches(item: &LoadingItem, filters: &AggregateFilters, search: Option<&str>) -> bool {
    if let Some(term) = search {
        let hit = item.particular.to_lowercase().contains(term)
            || item
                .item_no
                .as_deref()
                .map_or(false, |no| no.to_lowercase().contains(term))
            || item.ctn_mark.to_lowercase().contains(term);
        if !hit {
            return false;
        }
    }

    filters.ctn.contains(item.ctn as f64)
        && filters.weight.contains(item.ctn as f64 * item.wt)
        && filters.cbm.contains(item.ctn as f64 * item.cbm)
}

/// 过滤后的装柜单及其命中明细（保持输入顺序）
fn matched_sheets<'a>(
    sheets: &'a [LoadingSheet],
    filters: &AggregateFilters,
) -> Vec<(&'a LoadingSheet, Vec<&'a LoadingItem>)> {
    let search = filters.search_term();
    let item_filtered = filters.has_item_filters();

    sheets
        .iter()
        .filter(|sheet| sheet_matches(sheet, filters))
        .filter_map(|sheet| {
            let items: Vec<&LoadingItem> = sheet
                .items
                .iter()
                .filter(|item| item_matches(item, filters, search.as_deref()))
                .collect();
            // 有明细级过滤时,无命中明细的装柜单视为不匹配
            if item_filtered && items.is_empty() {
                None
            } else {
                Some((sheet, items))
            }
        })
        .collect()
}

fn compare_client_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

// ==========================================
// aggregate_container - 按客户分组
// ==========================================

/// 汇总一个集装箱
///
/// 同名唛头跨多张装柜单合并为一个分组
///
/// # 参数
/// - `sheets`: 该集装箱全部装柜单（含明细,按插入顺序）
pub fn aggregate_container(
    container: &Container,
    sheets: &[LoadingSheet],
    filters: &AggregateFilters,
) -> ContainerAggregate {
    struct Pending {
        client: String,
        sheet_ids: Vec<i64>,
        acc: Accumulator,
        items: Vec<LoadingItem>,
    }

    let mut order: Vec<Pending> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (sheet, items) in matched_sheets(sheets, filters) {
        if items.is_empty() {
            continue;
        }
        let slot = *index.entry(sheet.shipping_mark.clone()).or_insert_with(|| {
            order.push(Pending {
                client: sheet.shipping_mark.clone(),
                sheet_ids: Vec::new(),
                acc: Accumulator::default(),
                items: Vec::new(),
            });
            order.len() - 1
        });

        let group = &mut order[slot];
        if !group.sheet_ids.contains(&sheet.id) {
            group.sheet_ids.push(sheet.id);
        }
        for item in items {
            group.acc.add_item(item);
            group.items.push(item.clone());
        }
    }

    match filters.sort {
        SortKey::ClientName => order.sort_by(|a, b| compare_client_names(&a.client, &b.client)),
        SortKey::TotalCtnDesc => order.sort_by(|a, b| {
            b.acc
                .ctn
                .cmp(&a.acc.ctn)
                .then_with(|| compare_client_names(&a.client, &b.client))
        }),
    }

    let client_count = order.len();
    let per_client: Vec<ClientGroup> = order
        .into_iter()
        .map(|g| ClientGroup {
            client: g.client,
            sheet_ids: g.sheet_ids,
            totals: g.acc.group_totals(),
            items: g.items,
        })
        .collect();

    let mut overall = Accumulator::default();
    for group in &per_client {
        overall.add_group(&group.totals);
    }

    tracing::debug!(
        container_code = %container.code,
        client_count,
        total_ctn = overall.ctn,
        "集装箱汇总完成"
    );

    ContainerAggregate {
        container_code: container.code.clone(),
        origin: container.origin.clone(),
        per_client,
        overall_totals: OverallTotals {
            total_ctn: overall.ctn,
            total_pcs: overall.tpcs,
            total_cbm: round3(overall.tcbm),
            total_weight: round2(overall.twt),
            total_items: overall.items,
            client_count,
        },
    }
}

// ==========================================
// 集装箱看板
// ==========================================

/// 汇总单个集装箱的看板行
///
/// # 返回
/// - None: 存在过滤条件且该集装箱没有任何命中
pub fn summarize_container(
    container: &Container,
    sheets: &[LoadingSheet],
    filters: &AggregateFilters,
) -> Option<ContainerSummary> {
    let matched = matched_sheets(sheets, filters);
    if matched.is_empty() && !filters.is_empty() {
        return None;
    }

    // 按客户累加,与 aggregate_container 的总计口径一致
    let mut per_client: HashMap<&str, Accumulator> = HashMap::new();
    let mut clients: Vec<String> = Vec::new();
    // 最新装柜日期; 同日期取后插入者（id 更大）
    let mut latest: Option<&LoadingSheet> = None;

    for (sheet, items) in &matched {
        let client = per_client.entry(sheet.shipping_mark.as_str()).or_default();
        for item in items {
            client.add_item(item);
        }
        if !clients.contains(&sheet.shipping_mark) {
            clients.push(sheet.shipping_mark.clone());
        }
        let newer = latest.map_or(true, |cur| {
            (sheet.loading_date, sheet.id) > (cur.loading_date, cur.id)
        });
        if newer {
            latest = Some(*sheet);
        }
    }
    clients.sort_by(|a, b| compare_client_names(a, b));

    let mut acc = Accumulator::default();
    for client in &clients {
        if let Some(group) = per_client.get(client.as_str()) {
            acc.add_group(&group.group_totals());
        }
    }

    Some(ContainerSummary {
        container_code: container.code.clone(),
        origin: container.origin.clone(),
        latest_status: latest.map(|s| s.status),
        latest_loading_date: latest.map(|s| s.loading_date),
        total_ctn: acc.ctn,
        total_pcs: acc.tpcs,
        total_cbm: round3(acc.tcbm),
        total_weight: round2(acc.twt),
        client_count: clients.len(),
        clients,
        sheet_count: matched.len(),
    })
}

/// 汇总全部集装箱并分页
///
/// 排序: 最新装柜日期降序（无装柜单的排最后）,再按箱号升序
///
/// # 参数
/// - `sheets`: 全部装柜单,按 container_id 归属
/// - `page`: 从 1 开始
/// - `limit`: 已由调用方解析为正数
pub fn summarize_containers(
    containers: &[Container],
    sheets: &[LoadingSheet],
    filters: &AggregateFilters,
    page: u32,
    limit: u32,
) -> ContainerPage {
    let mut by_container: HashMap<i64, Vec<LoadingSheet>> = HashMap::new();
    for sheet in sheets {
        by_container
            .entry(sheet.container_id)
            .or_default()
            .push(sheet.clone());
    }

    let mut summaries: Vec<ContainerSummary> = containers
        .iter()
        .filter_map(|c| {
            let own = by_container.get(&c.id).map(Vec::as_slice).unwrap_or(&[]);
            summarize_container(c, own, filters)
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.latest_loading_date
            .cmp(&a.latest_loading_date)
            .then_with(|| a.container_code.cmp(&b.container_code))
    });

    let pagination = Pagination::new(page, limit, summaries.len());
    let containers = summaries
        .into_iter()
        .skip(pagination.offset())
        .take(limit as usize)
        .collect();

    ContainerPage {
        containers,
        pagination,
    }
}

// ==========================================
// 通用单证汇总
// ==========================================

/// 按明细分组键汇总单证
///
/// 分组按键名排序（忽略大小写）; 与集装箱汇总相同的舍入规则,金额 2 位
pub fn summarize_document<L: DocumentLine>(
    record_id: i64,
    reference: &str,
    lines: &[LineRecord<L>],
) -> DocumentSummary {
    let mut groups: Vec<MeasureTotals> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in lines {
        let key = record.line.group_key();
        let m = record.line.measures();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(MeasureTotals {
                key,
                ..Default::default()
            });
            groups.len() - 1
        });

        add_measures(&mut groups[slot], 1, m.ctn, m.pcs, m.cbm, m.weight, m.amount);
    }

    let finish = |mut t: MeasureTotals| {
        t.cbm = round3(t.cbm);
        t.weight = round2(t.weight);
        t.amount = round2(t.amount);
        t
    };

    groups.sort_by(|a, b| compare_client_names(&a.key, &b.key));
    let groups: Vec<MeasureTotals> = groups.into_iter().map(finish).collect();

    let mut overall = MeasureTotals {
        key: reference.to_string(),
        ..Default::default()
    };
    for g in &groups {
        add_measures(&mut overall, g.line_count, g.ctn, g.pcs, g.cbm, g.weight, g.amount);
    }

    DocumentSummary {
        record_id,
        reference: reference.to_string(),
        groups,
        totals: finish(overall),
    }
}

#[allow(clippy::too_many_arguments)]
fn add_measures(
    totals: &mut MeasureTotals,
    line_count: usize,
    ctn: i64,
    pcs: i64,
    cbm: f64,
    weight: f64,
    amount: f64,
) {
    totals.line_count += line_count;
    totals.ctn = totals.ctn.saturating_add(ctn);
    totals.pcs = totals.pcs.saturating_add(pcs);
    totals.cbm += cbm;
    totals.weight += weight;
    totals.amount += amount;
}
