// ==========================================
// 钢结构项目管理 - 加工包与构件领域模型
// ==========================================
// 职责: 加工计划产生的加工包/构件快照 + 字段补丁
// 红线: 状态变更只能通过补丁写回协作存储
// ==========================================

use crate::domain::types::{PackageStatus, PieceStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// FabricationPackage - 加工包
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricationPackage {
    // ===== 主键 =====
    pub id: String,
    pub project_id: String,
    pub work_package_id: Option<String>,
    pub package_number: String,

    // ===== 状态 =====
    pub status: PackageStatus,
    pub drawing_set_ids: BTreeSet<String>, // 集合语义,迭代顺序稳定
    pub bom_verified: bool,
    pub linked_delivery_id: Option<String>,

    // ===== 数量/重量 =====
    pub total_pieces: u32,
    pub pieces_complete: u32, // 派生值,由聚合器回写
    pub total_weight_tons: f64,
}

// ==========================================
// FabricationItem - 构件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FabricationItem {
    pub id: String,
    pub package_id: String,
    pub piece_mark: String,
    pub status: PieceStatus,
    pub material_status: Option<String>,
    pub on_hold: bool,
    pub weight_tons: f64,
}

// ==========================================
// PackagePatch - 加工包字段补丁
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackagePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PackageStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bom_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_delivery_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pieces_complete: Option<u32>,
}

impl PackagePatch {
    pub fn status(status: PackageStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.bom_verified.is_none()
            && self.linked_delivery_id.is_none()
            && self.pieces_complete.is_none()
    }

    pub fn apply_to(&self, package: &mut FabricationPackage) {
        if let Some(status) = self.status {
            package.status = status;
        }
        if let Some(bom) = self.bom_verified {
            package.bom_verified = bom;
        }
        if let Some(delivery) = &self.linked_delivery_id {
            package.linked_delivery_id = Some(delivery.clone());
        }
        if let Some(complete) = self.pieces_complete {
            package.pieces_complete = complete;
        }
    }
}

// ==========================================
// PiecePatch - 构件字段补丁
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PiecePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PieceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_hold: Option<bool>,
}

impl PiecePatch {
    pub fn status(status: PieceStatus) -> Self {
        Self {
            status: Some(status),
            on_hold: None,
        }
    }

    pub fn apply_to(&self, piece: &mut FabricationItem) {
        if let Some(status) = self.status {
            piece.status = status;
        }
        if let Some(on_hold) = self.on_hold {
            piece.on_hold = on_hold;
        }
    }
}
