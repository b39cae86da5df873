// ==========================================
// 货代后台系统 - 引擎层
// ==========================================
// 职责: 实现业务规则,不拼 SQL
// 红线: 汇总为纯函数,输入是一次快照读取的数据
// ==========================================

pub mod aggregation;
pub mod error;
pub mod ingestion;
pub mod lifecycle;
pub mod numeric;

// 重导出核心引擎
pub use aggregation::{aggregate_container, summarize_container, summarize_containers, summarize_document};
pub use error::{EngineError, EngineResult};
pub use ingestion::{normalize_row, normalize_rows};
pub use lifecycle::{LifecycleManager, TransitionPolicy};
pub use numeric::{lenient_f64, lenient_i64, round2, round3};
