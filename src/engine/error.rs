// ==========================================
// 货代后台系统 - 引擎层错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// 输入缺失或不合法（原样返回调用方）
    #[error("数据验证失败: {0}")]
    Validation(String),

    /// 状态迁移冲突（当前策略不产生,保留给迁移图校验）
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidTransition { from: String, to: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
