// ==========================================
// 钢结构项目管理 - 加工包汇总引擎
// ==========================================
// 职责: 构件状态汇总到加工包(数量/重量/完成率) + 放行/发运资格
// 输入: 加工包 + 构件列表 + 构件就绪判定 + 加工包就绪判定
// 输出: EnhancedPackage (只读视图)
// ==========================================
// 红线: 就绪不等于可放行,加工包必须处于 pending_prereqs
// ==========================================

use crate::domain::fabrication::{FabricationItem, FabricationPackage};
use crate::domain::types::{PackageStatus, PieceStatus};
use crate::engine::readiness::ReadinessVerdict;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==========================================
// EnhancedPackage - 加工包汇总视图
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedPackage {
    pub package: FabricationPackage,

    // ===== 数量 =====
    pub total_pieces: usize,
    pub pieces_complete: usize, // ready_to_ship + shipped
    pub pieces_released: usize, // 已越过 not_started
    pub pieces_on_hold: usize,
    pub completion_percent: f64,

    // ===== 重量 =====
    pub total_weight_tons: f64,
    pub weight_complete_tons: f64,

    // ===== 资格 =====
    pub readiness: ReadinessVerdict,
    pub can_release: bool,
    pub can_ship: bool,
    pub blocked_pieces: Vec<String>, // 就绪判定未通过的构件(保持输入顺序)
}

// ==========================================
// PackageAggregator - 加工包汇总引擎
// ==========================================
pub struct PackageAggregator {
    // 无状态引擎,不需要注入依赖
}

impl PackageAggregator {
    pub fn new() -> Self {
        Self {}
    }

    /// 汇总加工包
    ///
    /// # 参数
    /// - package: 加工包快照
    /// - pieces: 该加工包下的构件
    /// - readiness_by_piece: piece_id → 构件就绪判定(缺失的构件不计入 blocked_pieces)
    /// - package_readiness: 加工包级就绪判定
    pub fn aggregate(
        &self,
        package: &FabricationPackage,
        pieces: &[FabricationItem],
        readiness_by_piece: &HashMap<String, ReadinessVerdict>,
        package_readiness: ReadinessVerdict,
    ) -> EnhancedPackage {
        let total_pieces = pieces.len();
        let pieces_complete = Self::count_complete(pieces);
        let pieces_released = pieces
            .iter()
            .filter(|p| p.status > PieceStatus::NotStarted)
            .count();
        let pieces_on_hold = pieces.iter().filter(|p| p.on_hold).count();

        let total_weight_tons = if pieces.is_empty() {
            package.total_weight_tons
        } else {
            pieces.iter().map(|p| p.weight_tons).sum()
        };
        let weight_complete_tons = pieces
            .iter()
            .filter(|p| p.status.is_complete())
            .map(|p| p.weight_tons)
            .sum();

        let blocked_pieces = pieces
            .iter()
            .filter(|p| {
                readiness_by_piece
                    .get(&p.id)
                    .is_some_and(|verdict| !verdict.can_release)
            })
            .map(|p| p.id.clone())
            .collect();

        let can_release =
            package_readiness.can_release && package.status == PackageStatus::PendingPrereqs;
        let can_ship = package.status == PackageStatus::Complete
            && total_pieces > 0
            && pieces_complete == total_pieces;

        tracing::debug!(
            "加工包汇总: package={}, complete={}/{}, can_release={}, can_ship={}",
            package.id,
            pieces_complete,
            total_pieces,
            can_release,
            can_ship
        );

        EnhancedPackage {
            package: package.clone(),
            total_pieces,
            pieces_complete,
            pieces_released,
            pieces_on_hold,
            completion_percent: Self::completion_percent(pieces_complete, total_pieces),
            total_weight_tons,
            weight_complete_tons,
            readiness: package_readiness,
            can_release,
            can_ship,
            blocked_pieces,
        }
    }

    /// 完工构件数
    pub fn count_complete(pieces: &[FabricationItem]) -> usize {
        pieces.iter().filter(|p| p.status.is_complete()).count()
    }

    /// 完成率(0-100,不舍入,展示端自行取位);无构件时为 0
    pub fn completion_percent(complete: usize, total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        complete as f64 / total as f64 * 100.0
    }
}

impl Default for PackageAggregator {
    fn default() -> Self {
        Self::new()
    }
}
