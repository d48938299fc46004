// ==========================================
// 钢结构项目管理 - 领域层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 领域层错误类型
///
/// 只在边界解码时出现(状态字符串、嵌入式 JSON),引擎内部不会产生。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("未知状态: {kind}={value}")]
    UnknownStatus { kind: String, value: String },

    #[error("元数据版本不支持: version={0}")]
    UnsupportedMetadataVersion(u32),

    #[error("元数据解析失败: {0}")]
    MalformedMetadata(String),

    #[error("金额格式错误 (field={field}): {value}")]
    InvalidAmount { field: String, value: String },
}

impl DomainError {
    pub fn unknown_status(kind: &str, value: &str) -> Self {
        DomainError::UnknownStatus {
            kind: kind.to_string(),
            value: value.to_string(),
        }
    }
}
