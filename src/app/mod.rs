// ==========================================
// 货代后台系统 - 应用层
// ==========================================
// 职责: 装配共享状态,供 HTTP 层/命令行调用
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
