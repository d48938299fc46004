// ==========================================
// 钢结构项目管理 - 领域模型层
// ==========================================
// 职责: 定义领域实体、状态类型、字段补丁
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod billing;
pub mod drawing;
pub mod error;
pub mod fabrication;
pub mod types;

// 重导出核心类型
pub use billing::{InvoiceLine, SovItem, SovPatch};
pub use drawing::{DrawingMetadata, DrawingSet, Rfi};
pub use error::DomainError;
pub use fabrication::{FabricationItem, FabricationPackage, PackagePatch, PiecePatch};
pub use types::{DrawingStatus, InvoiceStatus, PackageStatus, PieceStatus, RfiStatus};
