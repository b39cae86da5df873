// ==========================================
// 货代后台系统 - 命令行入口
// ==========================================
// 用法:
//   freight-backoffice <db_path> init
//   freight-backoffice <db_path> import <file> <container> <shipping_mark> <yyyy-mm-dd> [origin]
//   freight-backoffice <db_path> aggregate <container>
//   freight-backoffice <db_path> containers [page] [limit]
//   freight-backoffice <db_path> activities <sheet_id>
// 输出: stdout 为 JSON,日志走 stderr
// ==========================================

use chrono::NaiveDate;
use freight_backoffice::app::{get_default_db_path, AppState};
use freight_backoffice::domain::AggregateFilters;
use freight_backoffice::importer::{ImportRequest, ShipmentImporter};
use freight_backoffice::{logging, APP_NAME, VERSION};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;

const USAGE: &str = "用法: freight-backoffice <db_path|-> <init|import|aggregate|containers|activities> [参数...]";

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn required(args: &[String], idx: usize, name: &str) -> Result<String, Box<dyn Error>> {
    args.get(idx)
        .cloned()
        .ok_or_else(|| format!("缺少参数 <{}>\n{}", name, USAGE).into())
}

fn parse_u32(args: &[String], idx: usize) -> Result<u32, Box<dyn Error>> {
    match args.get(idx) {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(0),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("{} v{}", APP_NAME, VERSION);
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    // "-" 使用默认数据库路径
    let db_path = match args[0].as_str() {
        "-" => get_default_db_path(),
        path => path.to_string(),
    };
    tracing::info!("使用数据库: {}", db_path);
    let state = AppState::new(db_path)?;

    match args[1].as_str() {
        "init" => {
            print_json(&serde_json::json!({ "db_path": state.db_path, "version": VERSION }))?;
        }
        "import" => {
            let loading_date = NaiveDate::parse_from_str(&required(&args, 5, "yyyy-mm-dd")?, "%Y-%m-%d")?;
            let request = ImportRequest {
                file_path: PathBuf::from(required(&args, 2, "file")?),
                container_code: required(&args, 3, "container")?,
                shipping_mark: required(&args, 4, "shipping_mark")?,
                loading_date,
                origin: args.get(6).cloned(),
                actor_id: None,
            };
            let outcome = state.importer.import_file(request).await?;
            print_json(&outcome)?;
        }
        "aggregate" => {
            let code = required(&args, 2, "container")?;
            let aggregate = state
                .aggregation_api
                .aggregate_container(&code, &AggregateFilters::default())?;
            print_json(&aggregate)?;
        }
        "containers" => {
            let page = parse_u32(&args, 2)?;
            let limit = parse_u32(&args, 3)?;
            let result = state
                .aggregation_api
                .aggregate_containers_list(&AggregateFilters::default(), page, limit)?;
            print_json(&result)?;
        }
        "activities" => {
            let sheet_id: i64 = required(&args, 2, "sheet_id")?.parse()?;
            let activities = state.activity_api.list_activities(sheet_id, None)?;
            print_json(&activities)?;
        }
        other => {
            eprintln!("未知命令: {}\n{}", other, USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}
