// ==========================================
// 钢结构项目管理 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换各层错误为用户可读的错误消息
// 红线: 业务拒绝与存储故障分开,只有存储写入失败可重试
// ==========================================

use crate::engine::billing_ledger::RejectionReason;
use crate::engine::concurrency_guard::GuardError;
use crate::engine::transition::TransitionRejection;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则拒绝(可恢复,需用户修改操作)
    // ==========================================
    #[error("计量编辑被拒绝: {0}")]
    EditRejected(RejectionReason),

    #[error("状态流转被拒绝: {0}")]
    TransitionBlocked(TransitionRejection),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("编辑冲突: {0}")]
    EditInFlight(String),

    /// 存储写入失败,视图已回滚;可重试
    #[error("存储写入失败(rolled_back={rolled_back}): {message}")]
    StoreWriteFailed { message: String, rolled_back: bool },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据质量错误: {0}")]
    DataQualityError(String),

    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定的错误码(供宿主 UI 分支处理)
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::EditRejected(reason) => reason.code(),
            ApiError::TransitionBlocked(_) => "TRANSITION_BLOCKED",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::EditInFlight(_) => "EDIT_IN_FLIGHT",
            ApiError::StoreWriteFailed { .. } => "STORE_WRITE_FAILED",
            ApiError::DatabaseError(_) | ApiError::DatabaseConnectionError(_) => "DATABASE_ERROR",
            ApiError::DataQualityError(_) => "DATA_QUALITY_ERROR",
            ApiError::ConfigError(_) => "CONFIG_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::StoreWriteFailed { .. })
    }

    /// 面向用户的说明(业务拒绝按当前语言渲染)
    pub fn user_message(&self) -> String {
        match self {
            ApiError::EditRejected(reason) => reason.message(),
            ApiError::TransitionBlocked(rejection) => rejection.message(),
            other => other.to_string(),
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code().to_string(),
            message: self.user_message(),
            retryable: self.is_retryable(),
        }
    }
}

/// 错误的序列化形态(宿主渲染提示用)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub retryable: bool,
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
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::StoreUnavailable(msg) => ApiError::DatabaseConnectionError(msg),

            // 数据质量错误
            RepositoryError::DecodeError(err) => ApiError::DataQualityError(err.to_string()),
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DataQualityError(format!("字段{}错误: {}", field, message))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<RejectionReason> for ApiError {
    fn from(reason: RejectionReason) -> Self {
        ApiError::EditRejected(reason)
    }
}

impl From<TransitionRejection> for ApiError {
    fn from(rejection: TransitionRejection) -> Self {
        ApiError::TransitionBlocked(rejection)
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Rejected(reason) => ApiError::EditRejected(reason),
            GuardError::NotFound { item_id } => {
                ApiError::NotFound(format!("SovItem(id={})不在当前视图中", item_id))
            }
            GuardError::EditInFlight { item_id } => {
                ApiError::EditInFlight(format!("计量行{}已有未完成的编辑", item_id))
            }
            GuardError::WriteFailed {
                item_id,
                rolled_back,
                source,
            } => ApiError::StoreWriteFailed {
                message: format!("计量行{}: {}", item_id, source),
                rolled_back,
            },
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
