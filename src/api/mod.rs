// ==========================================
// 钢结构项目管理 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供宿主 UI 调用
// ==========================================

pub mod billing_api;
pub mod error;
pub mod fabrication_api;

// 重导出核心类型
pub use billing_api::BillingApi;
pub use error::{ApiError, ApiResult, ErrorPayload};
pub use fabrication_api::FabricationApi;
