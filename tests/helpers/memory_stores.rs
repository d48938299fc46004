// ==========================================
// 内存协作存储 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use steel_pm_engine::domain::billing::{InvoiceLine, SovItem, SovPatch};
use steel_pm_engine::domain::drawing::{DrawingSet, Rfi};
use steel_pm_engine::domain::fabrication::{
    FabricationItem, FabricationPackage, PackagePatch, PiecePatch,
};
use steel_pm_engine::engine::{EngineNotice, EngineStores, NotificationSink};
use steel_pm_engine::repository::{
    BillingStore, DrawingRfiReader, FabricationStore, RepositoryError, RepositoryResult,
};

// ==========================================
// 图纸/RFI
// ==========================================

#[derive(Default)]
pub struct MemoryDrawings {
    pub drawings: Mutex<Vec<DrawingSet>>,
    pub rfis: Mutex<Vec<Rfi>>,
}

impl MemoryDrawings {
    pub fn new(drawings: Vec<DrawingSet>, rfis: Vec<Rfi>) -> Self {
        Self {
            drawings: Mutex::new(drawings),
            rfis: Mutex::new(rfis),
        }
    }

    pub fn set_rfis(&self, rfis: Vec<Rfi>) {
        *self.rfis.lock().unwrap() = rfis;
    }
}

#[async_trait]
impl DrawingRfiReader for MemoryDrawings {
    async fn list_drawing_sets(&self, project_id: &str) -> RepositoryResult<Vec<DrawingSet>> {
        Ok(self
            .drawings
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_rfis(&self, project_id: &str) -> RepositoryResult<Vec<Rfi>> {
        Ok(self
            .rfis
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }
}

// ==========================================
// 加工包/构件
// ==========================================

#[derive(Default)]
pub struct MemoryFabrication {
    pub packages: Mutex<BTreeMap<String, FabricationPackage>>,
    pub pieces: Mutex<BTreeMap<String, FabricationItem>>,
}

impl MemoryFabrication {
    pub fn new(packages: Vec<FabricationPackage>, pieces: Vec<FabricationItem>) -> Self {
        Self {
            packages: Mutex::new(packages.into_iter().map(|p| (p.id.clone(), p)).collect()),
            pieces: Mutex::new(pieces.into_iter().map(|p| (p.id.clone(), p)).collect()),
        }
    }

    pub fn package(&self, id: &str) -> FabricationPackage {
        self.packages.lock().unwrap()[id].clone()
    }

    pub fn piece(&self, id: &str) -> FabricationItem {
        self.pieces.lock().unwrap()[id].clone()
    }
}

#[async_trait]
impl FabricationStore for MemoryFabrication {
    async fn get_package(&self, package_id: &str) -> RepositoryResult<Option<FabricationPackage>> {
        Ok(self.packages.lock().unwrap().get(package_id).cloned())
    }

    async fn list_packages(&self, project_id: &str) -> RepositoryResult<Vec<FabricationPackage>> {
        Ok(self
            .packages
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_pieces(&self, package_id: &str) -> RepositoryResult<Vec<FabricationItem>> {
        Ok(self
            .pieces
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.package_id == package_id)
            .cloned()
            .collect())
    }

    async fn get_piece(&self, piece_id: &str) -> RepositoryResult<Option<FabricationItem>> {
        Ok(self.pieces.lock().unwrap().get(piece_id).cloned())
    }

    async fn update_package(&self, package_id: &str, patch: &PackagePatch) -> RepositoryResult<()> {
        let mut packages = self.packages.lock().unwrap();
        let package = packages
            .get_mut(package_id)
            .ok_or_else(|| RepositoryError::not_found("FabricationPackage", package_id))?;
        patch.apply_to(package);
        Ok(())
    }

    async fn update_piece(&self, piece_id: &str, patch: &PiecePatch) -> RepositoryResult<()> {
        let mut pieces = self.pieces.lock().unwrap();
        let piece = pieces
            .get_mut(piece_id)
            .ok_or_else(|| RepositoryError::not_found("FabricationItem", piece_id))?;
        patch.apply_to(piece);
        Ok(())
    }
}

// ==========================================
// 计量
// ==========================================

#[derive(Default)]
pub struct MemoryBilling {
    pub items: Mutex<BTreeMap<String, SovItem>>,
    pub invoice_lines: Mutex<Vec<InvoiceLine>>,
    pub fail_writes: AtomicBool,
    pub writes: Mutex<Vec<(String, SovPatch)>>,
}

impl MemoryBilling {
    pub fn new(items: Vec<SovItem>, invoice_lines: Vec<InvoiceLine>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().map(|i| (i.id.clone(), i)).collect()),
            invoice_lines: Mutex::new(invoice_lines),
            fail_writes: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn add_invoice_line(&self, line: InvoiceLine) {
        self.invoice_lines.lock().unwrap().push(line);
    }

    pub fn item(&self, id: &str) -> SovItem {
        self.items.lock().unwrap()[id].clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl BillingStore for MemoryBilling {
    async fn list_sov_items(&self, project_id: &str) -> RepositoryResult<Vec<SovItem>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_invoice_lines(&self, _project_id: &str) -> RepositoryResult<Vec<InvoiceLine>> {
        Ok(self.invoice_lines.lock().unwrap().clone())
    }

    async fn update_sov_item(&self, sov_item_id: &str, patch: &SovPatch) -> RepositoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::StoreUnavailable("store offline".to_string()));
        }
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(sov_item_id)
            .ok_or_else(|| RepositoryError::not_found("SovItem", sov_item_id))?;
        patch.apply_to(item);
        self.writes
            .lock()
            .unwrap()
            .push((sov_item_id.to_string(), patch.clone()));
        Ok(())
    }
}

// ==========================================
// 通知收集
// ==========================================

#[derive(Default)]
pub struct RecordingSink {
    pub notices: Mutex<Vec<EngineNotice>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.kind.as_str().to_string())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, notice: EngineNotice) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

/// 组装内存存储集合
pub fn memory_stores(
    drawings: Arc<MemoryDrawings>,
    fabrication: Arc<MemoryFabrication>,
    billing: Arc<MemoryBilling>,
) -> EngineStores {
    EngineStores::new(drawings, fabrication, billing)
}
