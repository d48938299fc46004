// ==========================================
// 钢结构项目管理 - 协作存储接口
// ==========================================
// 职责: 定义引擎所需的外部存储读写接口（不包含实现）
// 红线: 读取接口必须返回项目全部记录,不分页;过滤由引擎完成
// 红线: 写入为字段补丁,确认式(无部分成功语义)
// ==========================================

use crate::domain::billing::{InvoiceLine, SovItem, SovPatch};
use crate::domain::drawing::{DrawingSet, Rfi};
use crate::domain::fabrication::{FabricationItem, FabricationPackage, PackagePatch, PiecePatch};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// DrawingRfiReader - 图纸/RFI 只读接口
// ==========================================
#[async_trait]
pub trait DrawingRfiReader: Send + Sync {
    /// 项目全部图纸套
    async fn list_drawing_sets(&self, project_id: &str) -> RepositoryResult<Vec<DrawingSet>>;

    /// 项目全部 RFI
    async fn list_rfis(&self, project_id: &str) -> RepositoryResult<Vec<Rfi>>;
}

// ==========================================
// FabricationStore - 加工包/构件读写接口
// ==========================================
#[async_trait]
pub trait FabricationStore: Send + Sync {
    async fn get_package(&self, package_id: &str) -> RepositoryResult<Option<FabricationPackage>>;

    async fn list_packages(&self, project_id: &str) -> RepositoryResult<Vec<FabricationPackage>>;

    /// 加工包下全部构件
    async fn list_pieces(&self, package_id: &str) -> RepositoryResult<Vec<FabricationItem>>;

    async fn get_piece(&self, piece_id: &str) -> RepositoryResult<Option<FabricationItem>>;

    async fn update_package(&self, package_id: &str, patch: &PackagePatch) -> RepositoryResult<()>;

    async fn update_piece(&self, piece_id: &str, patch: &PiecePatch) -> RepositoryResult<()>;
}

// ==========================================
// BillingStore - 计量读写接口
// ==========================================
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// 项目全部计量行(billed_to_date 已由存储按已审批/已付款发票行汇总)
    async fn list_sov_items(&self, project_id: &str) -> RepositoryResult<Vec<SovItem>>;

    /// 项目全部发票行(带发票状态)
    async fn list_invoice_lines(&self, project_id: &str) -> RepositoryResult<Vec<InvoiceLine>>;

    async fn update_sov_item(&self, sov_item_id: &str, patch: &SovPatch) -> RepositoryResult<()>;
}
