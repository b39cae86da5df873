// ==========================================
// 货代后台系统 - API层错误类型
// ==========================================
// 职责: 把仓储/引擎/导入错误归并为对外错误分类
// 分类: VALIDATION / NOT_FOUND / CONFLICT / PERSISTENCE / IMPORT / INTERNAL
// 约束: 写入失败原样上抛,不自动重试
// ==========================================

use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用方错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 预留: 启用迁移图后由状态校验产生
    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("数据冲突: {0}")]
    Conflict(String),

    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 错误分类名（HTTP 层据此映射状态码）
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidStateTransition { .. } | ApiError::Conflict(_) => "CONFLICT",
            ApiError::ImportError(_) => "IMPORT",
            ApiError::DatabaseError(_) | ApiError::DatabaseConnectionError(_) => "PERSISTENCE",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self.kind() {
            "VALIDATION" | "IMPORT" => 400,
            "NOT_FOUND" => 404,
            "CONFLICT" => 409,
            _ => 500,
        }
    }

    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        ApiError::NotFound(format!("{}({})不存在", entity, key))
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::Conflict(format!("外键约束违反: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
        }
    }
}

// 事务 begin/commit 直接返回 rusqlite::Error
impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::from(RepositoryError::from(err))
    }
}

// 活动日志快照序列化失败
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::from(RepositoryError::from(err))
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::InvalidTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::ImportError(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_mapping() {
        let err: ApiError = RepositoryError::not_found("LoadingSheet", 7).into();
        assert_eq!(err.kind(), "NOT_FOUND");
        assert_eq!(err.http_status(), 404);
        assert!(err.to_string().contains("LoadingSheet"));

        let err: ApiError = RepositoryError::UniqueConstraintViolation("x".into()).into();
        assert_eq!(err.http_status(), 409);

        let err: ApiError = RepositoryError::DatabaseQueryError("disk".into()).into();
        assert_eq!(err.kind(), "PERSISTENCE");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_engine_error_mapping() {
        let err: ApiError = EngineError::Validation("rows 不能为空".into()).into();
        assert_eq!(err.kind(), "VALIDATION");
        assert_eq!(err.http_status(), 400);

        let err: ApiError = EngineError::InvalidTransition {
            from: "ARRIVED".into(),
            to: "DRAFT".into(),
        }
        .into();
        assert_eq!(err.kind(), "CONFLICT");
    }

    #[test]
    fn test_import_error_mapping() {
        let err: ApiError = ImportError::UnsupportedFormat("pdf".into()).into();
        assert_eq!(err.kind(), "IMPORT");
        assert!(err.to_string().contains("pdf"));
    }
}
