// ==========================================
// 钢结构项目管理 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod billing_repo;
pub mod drawing_repo;
pub mod error;
pub mod fabrication_repo;
pub mod traits;

// 重导出核心仓储
pub use billing_repo::BillingRepository;
pub use drawing_repo::DrawingRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use fabrication_repo::FabricationRepository;
pub use traits::{BillingStore, DrawingRfiReader, FabricationStore};
