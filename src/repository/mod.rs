// ==========================================
// 货代后台系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化; *_tx 函数接收 &Connection,
//       由 API 层把多个仓储组合进同一事务
// ==========================================

pub mod activity_repo;
pub mod container_repo;
pub mod document_repo;
pub mod error;
pub mod loading_repo;
pub mod user_repo;

// 重导出核心仓储
pub use activity_repo::ActivityRepository;
pub use container_repo::{ContainerRepository, MarkRepository};
pub use document_repo::DocumentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use loading_repo::LoadingSheetRepository;
pub use user_repo::UserRepository;
