// ==========================================
// 钢结构项目管理 - 状态流转校验
// ==========================================
// 红线: 进入 released / ready_to_ship 必须就绪判定通过
// 红线: 状态只进不退
// ==========================================
// 职责: 在写回协作存储之前校验加工包/构件的目标状态
// ==========================================

use crate::domain::fabrication::FabricationItem;
use crate::domain::types::{PackageStatus, PieceStatus};
use crate::engine::package_aggregator::EnhancedPackage;
use crate::engine::readiness::{ReadinessFailure, ReadinessVerdict};
use crate::i18n::t_with_args;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 校验通过时的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionDecision {
    Allowed,
    NoOp, // 目标状态与当前相同
}

/// 状态流转拒绝原因
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransitionRejection {
    #[error("未就绪: entity={entity_id}, failures={}", .failures.len())]
    NotReady {
        entity_id: String,
        failures: Vec<ReadinessFailure>,
    },

    #[error("状态回退: entity={entity_id}, from={from} to={to}")]
    Regression {
        entity_id: String,
        from: String,
        to: String,
    },

    #[error("构件暂扣中: entity={entity_id}")]
    OnHold { entity_id: String },

    #[error("状态不符: entity={entity_id}, expected={expected}, actual={actual}")]
    WrongState {
        entity_id: String,
        expected: String,
        actual: String,
    },

    #[error("存在未完工构件,不可发运: entity={entity_id}")]
    CannotShip { entity_id: String },
}

impl TransitionRejection {
    /// 按当前语言渲染拒绝说明
    pub fn message(&self) -> String {
        match self {
            TransitionRejection::NotReady {
                entity_id,
                failures,
            } => t_with_args(
                "transition.not_ready",
                &[("entity", entity_id), ("count", &failures.len().to_string())],
            ),
            TransitionRejection::Regression {
                entity_id,
                from,
                to,
            } => t_with_args(
                "transition.regression",
                &[("entity", entity_id), ("from", from), ("to", to)],
            ),
            TransitionRejection::OnHold { entity_id } => {
                t_with_args("transition.on_hold", &[("entity", entity_id)])
            }
            TransitionRejection::WrongState {
                entity_id,
                expected,
                actual,
            } => t_with_args(
                "transition.wrong_state",
                &[("entity", entity_id), ("expected", expected), ("actual", actual)],
            ),
            TransitionRejection::CannotShip { entity_id } => {
                t_with_args("transition.cannot_ship", &[("entity", entity_id)])
            }
        }
    }
}

pub struct TransitionGuard;

impl TransitionGuard {
    /// 校验加工包状态流转
    ///
    /// # 规则
    /// 1. 同状态 → NoOp
    /// 2. 回退 → Regression
    /// 3. 跨越 released: 当前必须为 pending_prereqs,且加工包就绪
    /// 4. 进入 shipped: 当前必须为 complete,且全部构件完工
    pub fn check_package_transition(
        view: &EnhancedPackage,
        target: PackageStatus,
    ) -> Result<TransitionDecision, TransitionRejection> {
        let package = &view.package;
        let current = package.status;

        if target == current {
            return Ok(TransitionDecision::NoOp);
        }
        if target < current {
            return Err(TransitionRejection::Regression {
                entity_id: package.id.clone(),
                from: current.to_string(),
                to: target.to_string(),
            });
        }

        if current < PackageStatus::Released && target >= PackageStatus::Released {
            if current != PackageStatus::PendingPrereqs {
                return Err(TransitionRejection::WrongState {
                    entity_id: package.id.clone(),
                    expected: PackageStatus::PendingPrereqs.to_string(),
                    actual: current.to_string(),
                });
            }
            if !view.readiness.can_release {
                return Err(TransitionRejection::NotReady {
                    entity_id: package.id.clone(),
                    failures: view.readiness.failures.clone(),
                });
            }
        }

        if target == PackageStatus::Shipped {
            if current != PackageStatus::Complete {
                return Err(TransitionRejection::WrongState {
                    entity_id: package.id.clone(),
                    expected: PackageStatus::Complete.to_string(),
                    actual: current.to_string(),
                });
            }
            if !view.can_ship {
                return Err(TransitionRejection::CannotShip {
                    entity_id: package.id.clone(),
                });
            }
        }

        Ok(TransitionDecision::Allowed)
    }

    /// 校验构件状态流转
    ///
    /// 跨越 released 或 ready_to_ship 时需要构件就绪判定通过。
    pub fn check_piece_transition(
        piece: &FabricationItem,
        target: PieceStatus,
        verdict: &ReadinessVerdict,
    ) -> Result<TransitionDecision, TransitionRejection> {
        let current = piece.status;

        if target == current {
            return Ok(TransitionDecision::NoOp);
        }
        if target < current {
            return Err(TransitionRejection::Regression {
                entity_id: piece.id.clone(),
                from: current.to_string(),
                to: target.to_string(),
            });
        }
        if piece.on_hold {
            return Err(TransitionRejection::OnHold {
                entity_id: piece.id.clone(),
            });
        }

        let crosses = |gate: PieceStatus| current < gate && target >= gate;
        if (crosses(PieceStatus::Released) || crosses(PieceStatus::ReadyToShip))
            && !verdict.can_release
        {
            return Err(TransitionRejection::NotReady {
                entity_id: piece.id.clone(),
                failures: verdict.failures.clone(),
            });
        }

        Ok(TransitionDecision::Allowed)
    }
}
