// ==========================================
// 测试数据构建器 - 用于集成测试
// ==========================================

use rust_decimal::Decimal;
use std::str::FromStr;
use steel_pm_engine::domain::billing::{InvoiceLine, SovItem};
use steel_pm_engine::domain::drawing::{DrawingSet, Rfi};
use steel_pm_engine::domain::fabrication::{FabricationItem, FabricationPackage};
use steel_pm_engine::domain::types::{
    DrawingStatus, InvoiceStatus, PackageStatus, PieceStatus, RfiStatus,
};

pub const PROJECT_ID: &str = "PRJ-001";

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

// ==========================================
// DrawingSet / Rfi
// ==========================================

pub fn drawing(id: &str, status: DrawingStatus) -> DrawingSet {
    DrawingSet {
        id: id.to_string(),
        project_id: PROJECT_ID.to_string(),
        title: format!("Drawing {}", id),
        status,
        due_date: None,
        metadata: None,
    }
}

pub fn rfi(id: &str, drawing_id: &str, status: RfiStatus) -> Rfi {
    Rfi {
        id: id.to_string(),
        project_id: PROJECT_ID.to_string(),
        subject: format!("Question {}", id),
        status,
        linked_drawing_set_id: Some(drawing_id.to_string()),
    }
}

// ==========================================
// FabricationPackage 构建器
// ==========================================

pub struct PackageBuilder {
    package: FabricationPackage,
}

impl PackageBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            package: FabricationPackage {
                id: id.to_string(),
                project_id: PROJECT_ID.to_string(),
                work_package_id: None,
                package_number: format!("FP-{}", id),
                status: PackageStatus::PendingPrereqs,
                drawing_set_ids: Default::default(),
                bom_verified: true,
                linked_delivery_id: None,
                total_pieces: 0,
                pieces_complete: 0,
                total_weight_tons: 0.0,
            },
        }
    }

    pub fn status(mut self, status: PackageStatus) -> Self {
        self.package.status = status;
        self
    }

    pub fn drawings(mut self, ids: &[&str]) -> Self {
        self.package.drawing_set_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn bom_verified(mut self, verified: bool) -> Self {
        self.package.bom_verified = verified;
        self
    }

    pub fn total_pieces(mut self, total: u32) -> Self {
        self.package.total_pieces = total;
        self
    }

    pub fn build(self) -> FabricationPackage {
        self.package
    }
}

// ==========================================
// FabricationItem 构建器
// ==========================================

pub struct PieceBuilder {
    piece: FabricationItem,
}

impl PieceBuilder {
    pub fn new(id: &str, package_id: &str) -> Self {
        Self {
            piece: FabricationItem {
                id: id.to_string(),
                package_id: package_id.to_string(),
                piece_mark: format!("B-{}", id),
                status: PieceStatus::NotStarted,
                material_status: None,
                on_hold: false,
                weight_tons: 1.0,
            },
        }
    }

    pub fn status(mut self, status: PieceStatus) -> Self {
        self.piece.status = status;
        self
    }

    pub fn on_hold(mut self, on_hold: bool) -> Self {
        self.piece.on_hold = on_hold;
        self
    }

    pub fn weight(mut self, tons: f64) -> Self {
        self.piece.weight_tons = tons;
        self
    }

    pub fn build(self) -> FabricationItem {
        self.piece
    }
}

// ==========================================
// SovItem / InvoiceLine
// ==========================================

pub struct SovItemBuilder {
    item: SovItem,
}

impl SovItemBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            item: SovItem {
                id: id.to_string(),
                project_id: PROJECT_ID.to_string(),
                sov_code: format!("SOV-{}", id),
                description: format!("Line {}", id),
                category: None,
                scheduled_value: dec("1000"),
                percent_complete: Decimal::ZERO,
                billed_to_date: Decimal::ZERO,
            },
        }
    }

    pub fn scheduled(mut self, value: &str) -> Self {
        self.item.scheduled_value = dec(value);
        self
    }

    pub fn percent(mut self, value: &str) -> Self {
        self.item.percent_complete = dec(value);
        self
    }

    pub fn billed(mut self, value: &str) -> Self {
        self.item.billed_to_date = dec(value);
        self
    }

    pub fn build(self) -> SovItem {
        self.item
    }
}

pub fn invoice_line(id: &str, sov_item_id: &str, status: InvoiceStatus, amount: &str) -> InvoiceLine {
    InvoiceLine {
        id: id.to_string(),
        invoice_id: format!("INV-{}", id),
        sov_item_id: sov_item_id.to_string(),
        invoice_status: status,
        amount: dec(amount),
    }
}
