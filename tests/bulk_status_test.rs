// ==========================================
// 批量改状态 集成测试
// ==========================================
// 测试范围:
// 1. 集装箱下全部装柜单同批更新,共享批次号与时间戳
// 2. 任一装柜单失败时整体回滚(不改状态、不写日志)
// ==========================================


use freight_backoffice::api::LOADING_ACTIVITY_TABLE;
use freight_backoffice::domain::activity::LoadingActivityType;
use freight_backoffice::domain::types::ShipmentStatus;
use freight_backoffice::repository::ActivityRepository;
use freight_backoffice::ApiError;
use serde_json::json;
use test_helpers::*;

fn loading_activities(env: &TestEnv) -> ActivityRepository<LoadingActivityType> {
    ActivityRepository::new(env.state.conn.clone(), LOADING_ACTIVITY_TABLE)
}

/// 同一集装箱下录入三张装柜单
fn seed_container(env: &TestEnv, code: &str) -> Vec<i64> {
    ["ACME", "BETA", "GAMMA"]
        .iter()
        .map(|mark| ingest(env, code, mark, date(2024, 1, 10), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]).id)
        .collect()
}

#[test]
fn test_bulk_update_shares_batch_and_timestamp() {
    let env = create_test_env().expect("无法创建测试环境");
    let clerk = seed_user(&env, "Clerk", "OPERATOR");
    let ids = seed_container(&env, "CONT-B");
    // 另一个集装箱不受影响
    let other = ingest(&env, "CONT-OTHER", "ACME", date(2024, 1, 10), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);

    let outcome = env
        .state
        .status_api
        .bulk_update_status("CONT-B", "in_transit", Some(clerk), Some("已开船".to_string()))
        .unwrap();
    assert_eq!(outcome.updated_count, 3);
    assert!(!outcome.batch_id.is_empty());

    for id in &ids {
        let sheet = env.state.shipment_api.get_sheet(*id).unwrap();
        assert_eq!(sheet.status, ShipmentStatus::InTransit);
    }
    assert_eq!(
        env.state.shipment_api.get_sheet(other.id).unwrap().status,
        ShipmentStatus::Draft
    );

    let batch = loading_activities(&env).list_by_batch(&outcome.batch_id).unwrap();
    assert_eq!(batch.len(), outcome.updated_count);
    for entry in &batch {
        assert_eq!(entry.activity_type, LoadingActivityType::StatusChange);
        assert_eq!(entry.created_at, outcome.changed_at);
        assert_eq!(entry.actor_name, "Clerk");
        assert_eq!(entry.note.as_deref(), Some("已开船"));
        assert_eq!(entry.new_value, Some(json!({ "status": "IN_TRANSIT" })));
        assert_eq!(entry.old_value, Some(json!({ "status": "DRAFT" })));
    }
    let mut parents: Vec<i64> = batch.iter().filter_map(|e| e.parent_id).collect();
    parents.sort_unstable();
    assert_eq!(parents, ids);
}

#[test]
fn test_bulk_update_rejects_before_touching_anything() {
    let env = create_test_env().expect("无法创建测试环境");
    seed_container(&env, "CONT-V");

    let err = env
        .state
        .status_api
        .bulk_update_status("CONT-V", "LOST", None, None)
        .unwrap_err();
    assert_eq!(err.kind(), "VALIDATION");

    let err = env
        .state
        .status_api
        .bulk_update_status("CONT-404", "ARRIVED", None, None)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = env
        .state
        .status_api
        .bulk_update_status("CONT-V", "ARRIVED", Some(31337), None)
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn test_bulk_update_rolls_back_when_one_sheet_fails() {
    let env = create_test_env().expect("无法创建测试环境");
    let ids = seed_container(&env, "CONT-ATOM");
    let repo = loading_activities(&env);
    let before: Vec<i64> = ids
        .iter()
        .map(|id| repo.count_by_parent(*id).unwrap())
        .collect();

    // 第三张装柜单更新时强制失败
    {
        let conn = env.state.conn.lock().expect("锁获取失败");
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_status_update BEFORE UPDATE OF status ON loading_sheet
             WHEN NEW.id = {}
             BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
            ids[2]
        ))
        .expect("创建触发器失败");
    }

    let err = env
        .state
        .status_api
        .bulk_update_status("CONT-ATOM", "ARRIVED", None, None)
        .unwrap_err();
    assert_eq!(err.kind(), "PERSISTENCE");

    // 前两张的修改同样被回滚
    for id in &ids {
        let sheet = env.state.shipment_api.get_sheet(*id).unwrap();
        assert_eq!(sheet.status, ShipmentStatus::Draft);
    }
    let after: Vec<i64> = ids
        .iter()
        .map(|id| repo.count_by_parent(*id).unwrap())
        .collect();
    assert_eq!(before, after, "失败批次不应留下任何活动日志");

    // 去掉触发器后同一批量操作可正常完成
    env.state
        .conn
        .lock()
        .expect("锁获取失败")
        .execute_batch("DROP TRIGGER fail_status_update;")
        .expect("删除触发器失败");
    let outcome = env
        .state
        .status_api
        .bulk_update_status("CONT-ATOM", "ARRIVED", None, None)
        .unwrap();
    assert_eq!(outcome.updated_count, 3);
}

#[test]
fn test_bulk_update_on_container_without_sheets() {
    let env = create_test_env().expect("无法创建测试环境");
    let sheet = ingest(&env, "CONT-EMPTY", "ACME", date(2024, 1, 10), &[num_row("Widget", "A1", 1, 1, 0.1, 1.0)]);
    env.state.shipment_api.delete_sheet(sheet.id, None).unwrap();

    let outcome = env
        .state
        .status_api
        .bulk_update_status("CONT-EMPTY", "COMPLETED", None, None)
        .unwrap();
    assert_eq!(outcome.updated_count, 0);
    assert!(loading_activities(&env).list_by_batch(&outcome.batch_id).unwrap().is_empty());
}
