// ==========================================
// 通用单证模块 集成测试
// ==========================================
// 测试范围:
// 1. 商业发票: 新建/查询/列表/明细/状态/批量/删除/汇总
// 2. 仓库计划: 独立的活动类型词表与状态词表
// 3. 分拨/收款表: 汇总分组
// ==========================================


use freight_backoffice::domain::activity::{DocumentActivityType, WarehouseActivityType};
use freight_backoffice::domain::document::DocumentFilters;
use freight_backoffice::domain::modules::{
    AccountingEntry, AccountingHeader, BifurcationHeader, ClientEntry, InvoiceHeader, InvoiceItem,
    PackingItem, PackingListHeader, WarehouseMark, WarehousePlanHeader,
};
use freight_backoffice::domain::types::{CollectionStatus, DocumentStatus, WarehouseStatus};
use freight_backoffice::ApiError;
use serde_json::json;
use test_helpers::*;

fn invoice_header() -> InvoiceHeader {
    InvoiceHeader {
        seller: "Yiwu Trading".to_string(),
        buyer: "ACME Ltd".to_string(),
        currency: "USD".to_string(),
        invoice_date: Some(date(2024, 1, 12)),
    }
}

fn invoice_item(description: &str, quantity: i64, unit_price: f64) -> InvoiceItem {
    InvoiceItem {
        description: description.to_string(),
        hsn_code: None,
        quantity,
        unit: Some("PCS".to_string()),
        unit_price,
    }
}

// ==========================================
// 商业发票
// ==========================================

#[test]
fn test_invoice_create_and_summarize() {
    let env = create_test_env().expect("无法创建测试环境");
    ingest(&env, "CONT-INV", "ACME", date(2024, 1, 10), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);
    let api = &env.state.invoice_api;

    let invoice = api
        .create(
            "INV-001",
            Some("CONT-INV"),
            invoice_header(),
            vec![
                invoice_item("Widget", 100, 1.25),
                invoice_item("Bolt", 40, 0.105),
                invoice_item("widget", 20, 1.25),
            ],
            None,
        )
        .unwrap();
    assert_eq!(invoice.status, DocumentStatus::Draft);
    assert_eq!(invoice.container_code.as_deref(), Some("CONT-INV"));
    assert_eq!(invoice.lines.len(), 3);
    assert_eq!(api.get(invoice.id).unwrap(), invoice);

    let summary = api.summarize(invoice.id).unwrap();
    assert_eq!(summary.reference, "INV-001");
    assert_eq!(summary.totals.pcs, 160);
    assert_eq!(summary.totals.amount, 154.2);
    assert_eq!(summary.totals.line_count, 3);
    let keys: Vec<&str> = summary.groups.iter().map(|g| g.key.as_str()).collect();
    assert_eq!(keys, vec!["Bolt", "Widget", "widget"]);

    let activities = api.list_activities(invoice.id, None).unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].activity_type, DocumentActivityType::Create);
    assert_eq!(activities[0].scope_ref.as_deref(), Some("INV-001"));
}

#[test]
fn test_invoice_create_validation() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.invoice_api;

    let err = api
        .create("  ", None, invoice_header(), Vec::new(), None)
        .unwrap_err();
    assert_eq!(err.kind(), "VALIDATION");

    let err = api
        .create(
            "INV-BAD",
            None,
            invoice_header(),
            vec![invoice_item("Widget", 1, 1.0), invoice_item("Bolt", -5, 1.0)],
            None,
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(ref msg) if msg.contains("第2条")));

    let err = api
        .create("INV-X", Some("CONT-404"), invoice_header(), Vec::new(), None)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    api.create("INV-DUP", None, invoice_header(), Vec::new(), None)
        .unwrap();
    let err = api
        .create("INV-DUP", None, invoice_header(), Vec::new(), None)
        .unwrap_err();
    assert_eq!(err.http_status(), 409);
}

#[test]
fn test_invoice_lines_and_header_edits() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.invoice_api;
    let invoice = api
        .create("INV-EDIT", None, invoice_header(), Vec::new(), None)
        .unwrap();

    let line = api
        .add_line(invoice.id, invoice_item("Widget", 10, 2.0), None)
        .unwrap();
    assert_eq!(line.record_id, invoice.id);

    let updated = api
        .update_line(line.id, invoice_item("Widget XL", 12, 2.5), None)
        .unwrap();
    assert_eq!(updated.line.description, "Widget XL");
    assert_eq!(updated.position, line.position);

    let mut header = invoice_header();
    header.currency = "EUR".to_string();
    let record = api.update_header(invoice.id, header, None).unwrap();
    assert_eq!(record.header.currency, "EUR");

    let record = api.delete_line(line.id, None).unwrap();
    assert!(record.lines.is_empty());
    assert!(matches!(api.delete_line(line.id, None), Err(ApiError::NotFound(_))));

    let types: Vec<DocumentActivityType> = api
        .list_activities(invoice.id, None)
        .unwrap()
        .iter()
        .map(|a| a.activity_type)
        .collect();
    assert_eq!(
        types,
        vec![
            DocumentActivityType::LineDeleted,
            DocumentActivityType::Update,
            DocumentActivityType::LineUpdated,
            DocumentActivityType::LineAdded,
            DocumentActivityType::Create,
        ]
    );
}

#[test]
fn test_invoice_list_filters_and_pages() {
    let env = create_test_env().expect("无法创建测试环境");
    ingest(&env, "CONT-L1", "ACME", date(2024, 1, 10), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);
    let api = &env.state.invoice_api;

    let first = api
        .create("INV-100", Some("CONT-L1"), invoice_header(), vec![invoice_item("Copper Wire", 1, 1.0)], None)
        .unwrap();
    api.create("INV-101", None, invoice_header(), vec![invoice_item("Steel Pipe", 1, 1.0)], None)
        .unwrap();
    api.create("INV-102", None, invoice_header(), Vec::new(), None)
        .unwrap();
    api.update_status(first.id, "final", None, None).unwrap();

    let all = api.list(&DocumentFilters::default(), 1, 2).unwrap();
    assert_eq!(all.pagination.total, 3);
    assert_eq!(all.pagination.total_pages, 2);
    assert_eq!(all.records.len(), 2);
    assert_eq!(all.records[0].reference, "INV-102");

    let finals = api
        .list(
            &DocumentFilters {
                status: Some(DocumentStatus::Final),
                ..Default::default()
            },
            1,
            0,
        )
        .unwrap();
    assert_eq!(finals.records.len(), 1);
    assert_eq!(finals.records[0].id, first.id);

    let by_line = api
        .list(
            &DocumentFilters {
                search: Some("PIPE".to_string()),
                ..Default::default()
            },
            1,
            0,
        )
        .unwrap();
    assert_eq!(by_line.records.len(), 1);
    assert_eq!(by_line.records[0].reference, "INV-101");

    let by_container = api
        .list(
            &DocumentFilters {
                container_code: Some("CONT-L1".to_string()),
                ..Default::default()
            },
            1,
            0,
        )
        .unwrap();
    assert_eq!(by_container.pagination.total, 1);
}

#[test]
fn test_invoice_bulk_status_and_rollback() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.invoice_api;
    let a = api.create("INV-A", None, invoice_header(), Vec::new(), None).unwrap();
    let b = api.create("INV-B", None, invoice_header(), Vec::new(), None).unwrap();

    let outcome = api
        .bulk_update_status(&[a.id, b.id], "FINAL", None, None)
        .unwrap();
    assert_eq!(outcome.updated_count, 2);
    for id in [a.id, b.id] {
        let record = api.get(id).unwrap();
        assert_eq!(record.status, DocumentStatus::Final);
        let latest = &api.list_activities(id, Some(1)).unwrap()[0];
        assert_eq!(latest.batch_id.as_deref(), Some(outcome.batch_id.as_str()));
        assert_eq!(latest.created_at, outcome.changed_at);
    }

    // 含不存在记录时整体回滚
    let err = api
        .bulk_update_status(&[a.id, 9_999], "CANCELLED", None, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(api.get(a.id).unwrap().status, DocumentStatus::Final);
    assert_eq!(api.list_activities(a.id, None).unwrap().len(), 2);

    // 重复 id 只改一次,只记一条日志
    let outcome = api
        .bulk_update_status(&[b.id, b.id, a.id, b.id], "CANCELLED", None, None)
        .unwrap();
    assert_eq!(outcome.updated_count, 2);
    let b_changes = api
        .list_activities(b.id, None)
        .unwrap()
        .iter()
        .filter(|e| e.batch_id.as_deref() == Some(outcome.batch_id.as_str()))
        .count();
    assert_eq!(b_changes, 1);
    assert_eq!(api.list_activities(b.id, None).unwrap().len(), 3);
}

#[test]
fn test_invoice_delete_and_export() {
    let env = create_test_env().expect("无法创建测试环境");
    let admin = seed_user(&env, "Admin", "ADMIN");
    let api = &env.state.invoice_api;
    let invoice = api
        .create("INV-DEL", None, invoice_header(), vec![invoice_item("Widget", 1, 1.0)], Some(admin))
        .unwrap();

    let exported = api.record_export(invoice.id, "pdf", Some(admin)).unwrap();
    assert_eq!(exported.activity_type, DocumentActivityType::Export);
    assert_eq!(exported.actor_name, "Admin");
    assert_eq!(exported.new_value, Some(json!({ "reference": "INV-DEL", "format": "pdf" })));

    api.delete(invoice.id, Some(admin)).unwrap();
    assert!(matches!(api.get(invoice.id), Err(ApiError::NotFound(_))));
    assert!(api.list_activities(invoice.id, None).unwrap().is_empty());

    let feed = api.list_reference_activities("INV-DEL", None).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].activity_type, DocumentActivityType::Delete);
    assert!(feed[0].parent_id.is_none());
    assert_eq!(feed[0].old_value.as_ref().unwrap()["line_count"], json!(1));

    // 编号释放后可重新使用
    api.create("INV-DEL", None, invoice_header(), Vec::new(), None)
        .unwrap();
}

// ==========================================
// 仓库计划
// ==========================================

fn warehouse_mark(mark: &str, ctn: i64, cbm: f64, weight: f64) -> WarehouseMark {
    WarehouseMark {
        mark: mark.to_string(),
        ctn,
        cbm,
        weight,
        location: Some("A-01".to_string()),
        status: WarehouseStatus::Pending,
    }
}

#[test]
fn test_warehouse_plan_uses_own_vocabularies() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.warehouse_plan_api;
    let header = WarehousePlanHeader {
        warehouse: "Lagos WH1".to_string(),
        planned_date: Some(date(2024, 2, 1)),
        remarks: None,
    };

    let plan = api
        .create("WP-1", None, header, vec![warehouse_mark("ACME", 8, 1.2, 300.0)], None)
        .unwrap();
    assert_eq!(plan.status, WarehouseStatus::Pending);

    api.add_line(plan.id, warehouse_mark("BETA", 3, 0.4, 95.5), None)
        .unwrap();
    let held = api.update_status(plan.id, "hold", None, None).unwrap();
    assert_eq!(held.status, WarehouseStatus::Hold);
    assert_eq!(
        api.update_status(plan.id, "ARRIVED", None, None)
            .unwrap_err()
            .kind(),
        "VALIDATION"
    );

    let types: Vec<WarehouseActivityType> = api
        .list_activities(plan.id, None)
        .unwrap()
        .iter()
        .map(|a| a.activity_type)
        .collect();
    assert_eq!(
        types,
        vec![
            WarehouseActivityType::StatusChange,
            WarehouseActivityType::MarkAdded,
            WarehouseActivityType::Created,
        ]
    );

    let custom = api
        .record_activity(plan.id, None, "mark_updated", None, Some(json!({ "mark": "ACME" })), None)
        .unwrap();
    assert_eq!(custom.activity_type, WarehouseActivityType::MarkUpdated);
    assert!(api
        .record_activity(plan.id, None, "LINE_ADDED", None, None, None)
        .is_err());

    let summary = api.summarize(plan.id).unwrap();
    assert_eq!(summary.totals.ctn, 11);
    assert_eq!(summary.totals.cbm, 1.6);
    assert_eq!(summary.totals.weight, 395.5);
}

// ==========================================
// 装箱单
// ==========================================

#[test]
fn test_packing_list_totals_multiply_per_carton_values() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.packing_list_api;
    let item = |mark: &str, ctn: i64, net: f64, gross: f64| PackingItem {
        ctn_mark: mark.to_string(),
        description: "Widget".to_string(),
        ctn,
        pcs_per_ctn: 24,
        net_weight_per_ctn: net,
        gross_weight_per_ctn: gross,
        cbm_per_ctn: 0.045,
    };
    let header = PackingListHeader {
        consignee: "ACME Ltd".to_string(),
        invoice_reference: Some("INV-001".to_string()),
        packing_date: None,
    };

    let err = api
        .create("PL-BAD", None, header.clone(), vec![item("A1", 1, 9.0, 8.0)], None)
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(ref msg) if msg.contains("净重")));

    let list = api
        .create("PL-1", None, header, vec![item("A1", 10, 7.5, 8.25), item("B1", 3, 7.5, 8.25)], None)
        .unwrap();
    let summary = api.summarize(list.id).unwrap();
    assert_eq!(summary.totals.ctn, 13);
    assert_eq!(summary.totals.pcs, 312);
    assert_eq!(summary.totals.cbm, 0.585);
    assert_eq!(summary.totals.weight, 107.25);
    assert_eq!(summary.groups[0].key, "A1");
    assert_eq!(summary.groups[0].cbm, 0.45);
}

// ==========================================
// 分拨 / 收款表
// ==========================================

#[test]
fn test_bifurcation_groups_by_client() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.bifurcation_api;
    let entry = |client: &str, ctn: i64| ClientEntry {
        client: client.to_string(),
        ctn_mark: None,
        ctn,
        pcs: ctn * 10,
        cbm: 0.5,
        weight: 12.25,
        delivery_location: None,
    };

    let record = api
        .create(
            "BIF-1",
            None,
            BifurcationHeader::default(),
            vec![entry("ACME", 4), entry("BETA", 2), entry("ACME", 1)],
            None,
        )
        .unwrap();
    let summary = api.summarize(record.id).unwrap();
    assert_eq!(summary.groups.len(), 2);
    assert_eq!(summary.groups[0].key, "ACME");
    assert_eq!(summary.groups[0].ctn, 5);
    assert_eq!(summary.groups[0].pcs, 50);
    assert_eq!(summary.totals.weight, 36.75);
}

#[test]
fn test_accounting_sheet_collection_status() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.accounting_api;
    let entry = |client: &str, debit: f64, credit: f64| AccountingEntry {
        client: client.to_string(),
        description: None,
        debit,
        credit,
        entry_date: Some(date(2024, 3, 1)),
    };

    let sheet = api
        .create(
            "ACC-2024-03",
            None,
            AccountingHeader {
                currency: "USD".to_string(),
                period: Some("2024-03".to_string()),
                remarks: None,
            },
            vec![entry("ACME", 1200.0, 200.0), entry("BETA", 300.5, 0.0)],
            None,
        )
        .unwrap();
    assert_eq!(sheet.status, CollectionStatus::Pending);

    let partial = api.update_status(sheet.id, "PARTIAL", None, None).unwrap();
    assert_eq!(partial.status, CollectionStatus::Partial);

    let summary = api.summarize(sheet.id).unwrap();
    assert_eq!(summary.totals.amount, 1300.5);
    assert_eq!(summary.groups[0].amount, 1000.0);
}
