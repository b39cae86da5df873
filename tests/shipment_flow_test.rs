// ==========================================
// 装柜单录入/修改/删除 集成测试
// ==========================================
// 测试范围:
// 1. ingest_shipment: 派生字段、字典 upsert、CREATE 日志
// 2. 状态往返与活动流倒序
// 3. 明细增删改、装柜单删除、导出登记
// 4. 操作人展示名与引用校验
// ==========================================


use freight_backoffice::domain::activity::LoadingActivityType;
use freight_backoffice::domain::shipment::{SheetPatch, ShipmentRow};
use freight_backoffice::domain::types::ShipmentStatus;
use freight_backoffice::ApiError;
use serde_json::json;
use test_helpers::*;

// ==========================================
// 录入
// ==========================================

#[test]
fn test_ingest_derives_totals_and_logs_create() {
    let env = create_test_env().expect("无法创建测试环境");

    let sheet = ingest(
        &env,
        "CONT-1",
        "ACME",
        date(2024, 1, 10),
        &[text_row("Widget", "A1", "10", "5", "0.02", "1.5")],
    );

    assert_eq!(sheet.container_code, "CONT-1");
    assert_eq!(sheet.shipping_mark, "ACME");
    assert_eq!(sheet.status, ShipmentStatus::Draft);
    assert_eq!(sheet.items.len(), 1);

    let item = &sheet.items[0];
    assert_eq!(item.ctn_mark, "A1");
    assert_eq!(item.tpcs, 50);
    assert_eq!(item.tcbm, 0.2);
    assert_eq!(item.twt, 15.0);

    let activities = env.state.activity_api.list_activities(sheet.id, None).unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].activity_type, LoadingActivityType::Create);
    assert_eq!(activities[0].actor_name, "System");
    assert_eq!(activities[0].scope_ref.as_deref(), Some("CONT-1"));
    let new_value = activities[0].new_value.as_ref().expect("CREATE 应包含 new_value");
    assert_eq!(new_value["item_count"], json!(1));
    assert_eq!(new_value["total_ctn"], json!(10));
}

#[test]
fn test_ingest_lenient_numeric_and_default_ctn_mark() {
    let env = create_test_env().expect("无法创建测试环境");

    let mut row = text_row("Gadget", "", "abc", "1,200", "", "n/a");
    row.ctn_mark = None;
    let sheet = ingest(&env, "CONT-L", "BETA", date(2024, 2, 1), &[row]);

    let item = &sheet.items[0];
    assert_eq!(item.ctn, 0, "非数字箱数按 0 处理");
    assert_eq!(item.pcs, 1200, "千分位逗号应被去掉");
    assert_eq!(item.cbm, 0.0);
    assert_eq!(item.wt, 0.0);
    assert_eq!(item.ctn_mark, "BETA", "缺省箱唛取客户唛头");
}

#[test]
fn test_ingest_rejects_empty_rows_and_blank_particular() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.shipment_api;

    let err = api
        .ingest_shipment("CONT-E", "CHINA", "ACME", date(2024, 1, 1), &[], None)
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let rows = vec![num_row("Widget", "A1", 1, 1, 0.1, 1.0), ShipmentRow::new("  ", "A1")];
    let err = api
        .ingest_shipment("CONT-E", "CHINA", "ACME", date(2024, 1, 1), &rows, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(ref msg) if msg.contains('2')));

    let err = api
        .ingest_shipment("  ", "CHINA", "ACME", date(2024, 1, 1), &rows[..1], None)
        .unwrap_err();
    assert_eq!(err.kind(), "VALIDATION");

    // 校验失败不应留下任何数据
    assert!(env.state.shipment_api.list_container_sheets("CONT-E").is_err());
}

#[test]
fn test_container_origin_never_overwritten() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.shipment_api;
    let rows = [num_row("Widget", "A1", 1, 1, 0.1, 1.0)];

    api.ingest_shipment("CONT-O", "CHINA", "ACME", date(2024, 1, 1), &rows, None)
        .unwrap();
    api.ingest_shipment("CONT-O", "VIETNAM", "ACME", date(2024, 1, 2), &rows, None)
        .unwrap();

    let aggregate = env
        .state
        .aggregation_api
        .aggregate_container("CONT-O", &Default::default())
        .unwrap();
    assert_eq!(aggregate.origin, "CHINA");
    assert_eq!(api.list_container_sheets("CONT-O").unwrap().len(), 2);
}

#[test]
fn test_blank_origin_uses_configured_default() {
    let env = create_test_env().expect("无法创建测试环境");
    env.state
        .config
        .set_value("import.default_origin", "TURKEY")
        .unwrap();

    env.state
        .shipment_api
        .ingest_shipment(
            "CONT-T",
            "",
            "ACME",
            date(2024, 1, 1),
            &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)],
            None,
        )
        .unwrap();

    let aggregate = env
        .state
        .aggregation_api
        .aggregate_container("CONT-T", &Default::default())
        .unwrap();
    assert_eq!(aggregate.origin, "TURKEY");
}

// ==========================================
// 状态往返
// ==========================================

#[test]
fn test_status_round_trip_is_allowed_and_logged() {
    let env = create_test_env().expect("无法创建测试环境");
    let clerk = seed_user(&env, "Clerk", "OPERATOR");
    let sheet = ingest(&env, "CONT-S", "ACME", date(2024, 1, 10), &[num_row("Widget", "A1", 2, 3, 0.1, 1.0)]);

    let arrived = env
        .state
        .status_api
        .update_status(sheet.id, "ARRIVED", Some(clerk), Some("到港".to_string()))
        .unwrap();
    assert_eq!(arrived.status, ShipmentStatus::Arrived);

    let back = env
        .state
        .status_api
        .update_status(sheet.id, "draft", Some(clerk), None)
        .unwrap();
    assert_eq!(back.status, ShipmentStatus::Draft);

    let activities = env.state.activity_api.list_activities(sheet.id, None).unwrap();
    let types: Vec<_> = activities.iter().map(|a| a.activity_type).collect();
    assert_eq!(
        types,
        vec![
            LoadingActivityType::StatusChange,
            LoadingActivityType::StatusChange,
            LoadingActivityType::Create,
        ]
    );

    // 最新在前: DRAFT 在 ARRIVED 之前
    assert_eq!(activities[0].new_value, Some(json!({ "status": "DRAFT" })));
    assert_eq!(activities[0].old_value, Some(json!({ "status": "ARRIVED" })));
    assert_eq!(activities[1].new_value, Some(json!({ "status": "ARRIVED" })));
    assert_eq!(activities[1].note.as_deref(), Some("到港"));
    assert_eq!(activities[0].actor_name, "Clerk");
    assert_eq!(activities[0].actor_role.as_deref(), Some("OPERATOR"));
    assert!(activities[0].created_at >= activities[1].created_at);
}

#[test]
fn test_status_same_value_still_logged() {
    let env = create_test_env().expect("无法创建测试环境");
    let sheet = ingest(&env, "CONT-S2", "ACME", date(2024, 1, 10), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);

    env.state
        .status_api
        .update_status(sheet.id, "DRAFT", None, None)
        .unwrap();
    let activities = env.state.activity_api.list_activities(sheet.id, None).unwrap();
    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0].activity_type, LoadingActivityType::StatusChange);
}

#[test]
fn test_invalid_status_and_missing_sheet() {
    let env = create_test_env().expect("无法创建测试环境");
    let sheet = ingest(&env, "CONT-S3", "ACME", date(2024, 1, 10), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);

    let err = env
        .state
        .status_api
        .update_status(sheet.id, "SHIPPED", None, None)
        .unwrap_err();
    assert_eq!(err.kind(), "VALIDATION");
    assert!(err.to_string().contains("IN_TRANSIT"));

    let err = env
        .state
        .status_api
        .update_status(99_999, "ARRIVED", None, None)
        .unwrap_err();
    assert_eq!(err.http_status(), 404);
}

// ==========================================
// 明细增删改
// ==========================================

#[test]
fn test_item_edits_recompute_and_log_update() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.shipment_api;
    let sheet = ingest(&env, "CONT-I", "ACME", date(2024, 3, 1), &[num_row("Widget", "A1", 10, 5, 0.02, 1.5)]);

    let sheet = api
        .add_items(sheet.id, &[num_row("Bolt", "B7", 4, 100, 0.011, 2.25)], None)
        .unwrap();
    assert_eq!(sheet.items.len(), 2);
    let bolt = sheet.items.iter().find(|i| i.particular == "Bolt").unwrap();
    assert_eq!(bolt.tpcs, 400);
    assert_eq!(bolt.tcbm, 0.044);
    assert_eq!(bolt.twt, 9.0);

    let updated = api
        .update_item(bolt.id, &num_row("Bolt M8", "B7", 6, 100, 0.011, 2.25), None)
        .unwrap();
    assert_eq!(updated.particular, "Bolt M8");
    assert_eq!(updated.tpcs, 600);
    assert_eq!(updated.tcbm, 0.066);
    assert_eq!(updated.twt, 13.5);

    let sheet = api.delete_item(updated.id, None).unwrap();
    assert_eq!(sheet.items.len(), 1);
    assert!(matches!(
        api.delete_item(updated.id, None),
        Err(ApiError::NotFound(_))
    ));

    let activities = env.state.activity_api.list_activities(sheet.id, None).unwrap();
    let updates = activities
        .iter()
        .filter(|a| a.activity_type == LoadingActivityType::Update)
        .count();
    assert_eq!(updates, 3, "追加/修改/删除各一条 UPDATE");
}

#[test]
fn test_oversized_quantity_coerced_and_api_stays_usable() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.shipment_api;
    let sheet = ingest(&env, "CONT-BIG", "ACME", date(2024, 3, 2), &[num_row("Widget", "A1", 10, 5, 0.02, 1.5)]);
    let item_id = sheet.items[0].id;

    let updated = api
        .update_item(item_id, &text_row("Widget", "", "1e30", "2", "0.1", "1.0"), None)
        .unwrap();
    assert_eq!(updated.ctn, 0);
    assert_eq!(updated.tpcs, 0);
    // 未给箱唛时回落到客户唛头
    assert_eq!(updated.ctn_mark, "ACME");

    let sheet = api
        .add_items(sheet.id, &[text_row("Bolt", "B7", "9223372036854775807", "9223372036854775807", "0", "0")], None)
        .unwrap();
    assert_eq!(sheet.items.len(), 2);
    assert!(sheet.items.iter().all(|i| i.ctn == 0 && i.tpcs == 0));

    assert!(api.get_sheet(sheet.id).is_ok());
    let aggregate = env
        .state
        .aggregation_api
        .aggregate_container("CONT-BIG", &Default::default())
        .unwrap();
    assert_eq!(aggregate.overall_totals.total_ctn, 0);
}

#[test]
fn test_update_sheet_fields() {
    let env = create_test_env().expect("无法创建测试环境");
    let api = &env.state.shipment_api;
    let sheet = ingest(&env, "CONT-U", "ACME", date(2024, 3, 1), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);

    let patch = SheetPatch {
        loading_date: Some(date(2024, 3, 5)),
        shipping_mark: Some("GAMMA".to_string()),
    };
    let updated = api.update_sheet(sheet.id, &patch, None).unwrap();
    assert_eq!(updated.loading_date, date(2024, 3, 5));
    assert_eq!(updated.shipping_mark, "GAMMA");

    let err = api.update_sheet(sheet.id, &SheetPatch::default(), None).unwrap_err();
    assert!(matches!(err, ApiError::ValidationError(_)));

    let latest = &env.state.activity_api.list_activities(sheet.id, Some(1)).unwrap()[0];
    assert_eq!(latest.activity_type, LoadingActivityType::Update);
    assert_eq!(latest.old_value.as_ref().unwrap()["shipping_mark"], json!("ACME"));
    assert_eq!(latest.new_value.as_ref().unwrap()["shipping_mark"], json!("GAMMA"));
}

// ==========================================
// 删除 / 导出
// ==========================================

#[test]
fn test_delete_sheet_keeps_container_level_entry() {
    let env = create_test_env().expect("无法创建测试环境");
    let admin = seed_user(&env, "Admin", "ADMIN");
    let keep = ingest(&env, "CONT-D", "ACME", date(2024, 4, 1), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);
    let gone = ingest(&env, "CONT-D", "BETA", date(2024, 4, 2), &[num_row("Gadget", "B1", 2, 2, 0.2, 2.0)]);

    let snapshot = env.state.shipment_api.delete_sheet(gone.id, Some(admin)).unwrap();
    assert_eq!(snapshot.shipping_mark, "BETA");

    assert!(matches!(
        env.state.shipment_api.get_sheet(gone.id),
        Err(ApiError::NotFound(_))
    ));
    assert!(env.state.activity_api.list_activities(gone.id, None).unwrap().is_empty());

    let feed = env
        .state
        .activity_api
        .list_container_activities("CONT-D", None)
        .unwrap();
    let delete = feed
        .iter()
        .find(|a| a.activity_type == LoadingActivityType::Delete)
        .expect("应保留集装箱级 DELETE 日志");
    assert!(delete.parent_id.is_none());
    assert_eq!(delete.actor_name, "Admin");
    assert_eq!(delete.old_value.as_ref().unwrap()["sheet_id"], json!(gone.id));
    assert_eq!(feed[0].id, delete.id, "DELETE 为最新一条");

    // 另一张装柜单不受影响
    assert_eq!(env.state.shipment_api.get_sheet(keep.id).unwrap().items.len(), 1);
}

#[test]
fn test_record_export_writes_container_entry() {
    let env = create_test_env().expect("无法创建测试环境");
    ingest(&env, "CONT-X", "ACME", date(2024, 4, 1), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);

    let logged = env
        .state
        .shipment_api
        .record_export("CONT-X", "xlsx", None)
        .unwrap();
    assert_eq!(logged.activity_type, LoadingActivityType::Export);
    assert_eq!(logged.new_value, Some(json!({ "container_code": "CONT-X", "format": "xlsx" })));

    assert!(matches!(
        env.state.shipment_api.record_export("CONT-404", "pdf", None),
        Err(ApiError::NotFound(_))
    ));
}

// ==========================================
// 活动日志 / 操作人
// ==========================================

#[test]
fn test_record_activity_validates_type_parent_and_actor() {
    let env = create_test_env().expect("无法创建测试环境");
    let sheet = ingest(&env, "CONT-A", "ACME", date(2024, 5, 1), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);
    let api = &env.state.activity_api;

    let record = api
        .record_activity(sheet.id, None, "export", None, Some(json!({ "format": "pdf" })), Some("客户索取".into()))
        .unwrap();
    assert_eq!(record.activity_type, LoadingActivityType::Export);
    assert_eq!(record.note.as_deref(), Some("客户索取"));

    assert_eq!(
        api.record_activity(sheet.id, None, "MARK_ADDED", None, None, None)
            .unwrap_err()
            .kind(),
        "VALIDATION"
    );
    assert!(matches!(
        api.record_activity(12_345, None, "UPDATE", None, None, None),
        Err(ApiError::NotFound(_))
    ));
    assert!(matches!(
        api.record_activity(sheet.id, Some(777), "UPDATE", None, None, None),
        Err(ApiError::NotFound(_))
    ));
}

#[test]
fn test_unknown_actor_rejects_mutation() {
    let env = create_test_env().expect("无法创建测试环境");
    let err = env
        .state
        .shipment_api
        .ingest_shipment(
            "CONT-Z",
            "CHINA",
            "ACME",
            date(2024, 1, 1),
            &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)],
            Some(4242),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
    assert!(env.state.shipment_api.list_container_sheets("CONT-Z").is_err());
}

#[test]
fn test_activity_limit_respected() {
    let env = create_test_env().expect("无法创建测试环境");
    let sheet = ingest(&env, "CONT-LIM", "ACME", date(2024, 1, 1), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);
    for status in ["IN_TRANSIT", "ARRIVED", "WAREHOUSE", "AVAILABLE"] {
        env.state.status_api.update_status(sheet.id, status, None, None).unwrap();
    }

    let api = &env.state.activity_api;
    assert_eq!(api.list_activities(sheet.id, None).unwrap().len(), 5);
    let top = api.list_activities(sheet.id, Some(2)).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].new_value, Some(json!({ "status": "AVAILABLE" })));
}
