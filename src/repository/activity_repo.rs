// ==========================================
// 货代后台系统 - 活动日志仓储
// ==========================================
// 一个泛型实现服务所有模块的 <prefix>_activity 表
// 红线: 只追加,不提供 UPDATE/DELETE
// ==========================================

mod core;
mod queries;


pub use self::core::ActivityRepository;
