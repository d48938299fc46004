// ==========================================
// 钢结构项目管理 - 就绪与计量一致性引擎
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 供宿主 UI 调用的规则库,自身不渲染、不鉴权
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 引擎参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{DrawingStatus, InvoiceStatus, PackageStatus, PieceStatus, RfiStatus};

// 领域实体
pub use domain::{
    DrawingMetadata, DrawingSet, FabricationItem, FabricationPackage, InvoiceLine, Rfi, SovItem,
};

// 引擎
pub use engine::{
    BillingLedger, ConcurrencyGuard, EngineStores, PackageAggregator, ReadinessEvaluator,
    TransitionGuard,
};

// API
pub use api::{ApiError, ApiResult, BillingApi, FabricationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 数据库版本
pub const DB_VERSION: &str = "v1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
