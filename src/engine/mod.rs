// ==========================================
// 钢结构项目管理 - 引擎层
// ==========================================
// 职责: 就绪判定、加工包聚合、状态迁移守卫、计量台账
// 红线: Engine 不拼 SQL, 所有拒绝必须输出 reason
// 红线: 就绪失败是判定结果,不是错误
// ==========================================

pub mod billing_ledger;
pub mod concurrency_guard;
pub mod events;
pub mod package_aggregator;
pub mod readiness;
pub mod repositories;
pub mod transition;

// 重导出核心引擎
pub use billing_ledger::{
    BillingLedger, BillingSummary, LedgerOptions, LineMetrics, RejectionReason, SovEdit,
};
pub use concurrency_guard::{CommitOutcome, ConcurrencyGuard, GuardError, SovViewCache};
pub use events::{
    EngineNotice, NoOpNotificationSink, NoticeKind, NotificationSink, OptionalNotificationSink,
};
pub use package_aggregator::{EnhancedPackage, PackageAggregator};
pub use readiness::{
    FailureReason, ReadinessEvaluator, ReadinessFailure, ReadinessOptions, ReadinessVerdict,
    RfiFailureMode, Severity,
};
pub use repositories::EngineStores;
pub use transition::{TransitionDecision, TransitionGuard, TransitionRejection};
