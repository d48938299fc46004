// ==========================================
// 钢结构项目管理 - 加工 API
// ==========================================
// 职责: 加工包就绪判定、放行、发运、构件推进
// 红线: 每次流转前重新判定,不使用缓存的就绪结果
// 红线: 拒绝必须带原因返回,不写库
// ==========================================

use std::collections::HashMap;

use tracing::{info, instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::engine_config_trait::EngineConfigReader;
use crate::domain::drawing::{DrawingSet, Rfi};
use crate::domain::fabrication::{FabricationItem, FabricationPackage, PackagePatch, PiecePatch};
use crate::domain::types::{PackageStatus, PieceStatus};
use crate::engine::events::{EngineNotice, NoticeKind, OptionalNotificationSink};
use crate::engine::package_aggregator::{EnhancedPackage, PackageAggregator};
use crate::engine::readiness::{ReadinessEvaluator, ReadinessVerdict};
use crate::engine::repositories::EngineStores;
use crate::engine::transition::{TransitionDecision, TransitionGuard, TransitionRejection};

// ==========================================
// FabricationApi - 加工 API
// ==========================================

/// 加工API
///
/// 职责：
/// 1. 加工包汇总视图(含逐构件就绪判定)
/// 2. 加工包放行 / 发运
/// 3. 构件状态推进与暂扣
/// 4. 流转结果通知
pub struct FabricationApi {
    stores: EngineStores,
    evaluator: ReadinessEvaluator,
    aggregator: PackageAggregator,
    notifications: OptionalNotificationSink,
}

impl FabricationApi {
    pub fn new(
        stores: EngineStores,
        evaluator: ReadinessEvaluator,
        notifications: OptionalNotificationSink,
    ) -> Self {
        Self {
            stores,
            evaluator,
            aggregator: PackageAggregator::new(),
            notifications,
        }
    }

    /// 按配置构建判定参数
    pub async fn from_config<C>(
        stores: EngineStores,
        config: &C,
        notifications: OptionalNotificationSink,
    ) -> ApiResult<Self>
    where
        C: EngineConfigReader + ?Sized,
    {
        let options = config
            .readiness_options()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(Self::new(stores, ReadinessEvaluator::new(options), notifications))
    }

    // ==========================================
    // 内部加载
    // ==========================================

    async fn load_package(&self, project_id: &str, package_id: &str) -> ApiResult<FabricationPackage> {
        let package = self
            .stores
            .fabrication
            .get_package(package_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("FabricationPackage(id={})不存在", package_id)))?;

        if package.project_id != project_id {
            return Err(ApiError::InvalidInput(format!(
                "加工包{}不属于项目{}",
                package_id, project_id
            )));
        }
        Ok(package)
    }

    /// 并发读取项目图纸与 RFI
    async fn load_drawings_and_rfis(&self, project_id: &str) -> ApiResult<(Vec<DrawingSet>, Vec<Rfi>)> {
        let (drawings, rfis) = futures::try_join!(
            self.stores.drawings.list_drawing_sets(project_id),
            self.stores.drawings.list_rfis(project_id),
        )?;
        Ok((drawings, rfis))
    }

    fn build_view(
        &self,
        package: &FabricationPackage,
        pieces: &[FabricationItem],
        drawings: &[DrawingSet],
        rfis: &[Rfi],
    ) -> EnhancedPackage {
        let readiness_by_piece: HashMap<String, ReadinessVerdict> = pieces
            .iter()
            .map(|piece| {
                (
                    piece.id.clone(),
                    self.evaluator.evaluate_piece(piece, package, drawings, rfis),
                )
            })
            .collect();
        let package_readiness = self.evaluator.evaluate_package(package, drawings, rfis);

        self.aggregator
            .aggregate(package, pieces, &readiness_by_piece, package_readiness)
    }

    fn publish_blocked(&self, entity_id: &str, rejection: &TransitionRejection) {
        warn!(entity_id, error = %rejection, "状态流转被拒绝");
        self.notifications.publish(EngineNotice::new(
            NoticeKind::TransitionBlocked,
            entity_id,
            rejection.message(),
        ));
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 加工包汇总视图
    #[instrument(skip(self))]
    pub async fn evaluate_package(&self, project_id: &str, package_id: &str) -> ApiResult<EnhancedPackage> {
        let package = self.load_package(project_id, package_id).await?;
        let ((drawings, rfis), pieces) = futures::try_join!(
            self.load_drawings_and_rfis(project_id),
            async {
                self.stores
                    .fabrication
                    .list_pieces(package_id)
                    .await
                    .map_err(ApiError::from)
            },
        )?;

        Ok(self.build_view(&package, &pieces, &drawings, &rfis))
    }

    /// 项目全部加工包汇总视图(图纸与 RFI 只读取一次)
    #[instrument(skip(self))]
    pub async fn evaluate_project(&self, project_id: &str) -> ApiResult<Vec<EnhancedPackage>> {
        let ((drawings, rfis), packages) = futures::try_join!(
            self.load_drawings_and_rfis(project_id),
            async {
                self.stores
                    .fabrication
                    .list_packages(project_id)
                    .await
                    .map_err(ApiError::from)
            },
        )?;

        let mut views = Vec::with_capacity(packages.len());
        for package in &packages {
            let pieces = self.stores.fabrication.list_pieces(&package.id).await?;
            views.push(self.build_view(package, &pieces, &drawings, &rfis));
        }
        Ok(views)
    }

    // ==========================================
    // 流转接口
    // ==========================================

    async fn transition_package(
        &self,
        project_id: &str,
        package_id: &str,
        target: PackageStatus,
        notice: NoticeKind,
    ) -> ApiResult<EnhancedPackage> {
        let view = self.evaluate_package(project_id, package_id).await?;

        match TransitionGuard::check_package_transition(&view, target) {
            Ok(TransitionDecision::NoOp) => Ok(view),
            Ok(TransitionDecision::Allowed) => {
                self.stores
                    .fabrication
                    .update_package(package_id, &PackagePatch::status(target))
                    .await?;
                info!(package_id, from = %view.package.status, to = %target, "加工包状态已更新");
                self.notifications.publish(EngineNotice::new(
                    notice,
                    package_id,
                    format!("{}: {} -> {}", view.package.package_number, view.package.status, target),
                ));
                self.evaluate_package(project_id, package_id).await
            }
            Err(rejection) => {
                self.publish_blocked(package_id, &rejection);
                Err(ApiError::TransitionBlocked(rejection))
            }
        }
    }

    /// 放行加工包(pending_prereqs -> released)
    #[instrument(skip(self))]
    pub async fn release_package(&self, project_id: &str, package_id: &str) -> ApiResult<EnhancedPackage> {
        self.transition_package(
            project_id,
            package_id,
            PackageStatus::Released,
            NoticeKind::PackageReleased,
        )
        .await
    }

    /// 发运加工包(complete -> shipped)
    #[instrument(skip(self))]
    pub async fn ship_package(&self, project_id: &str, package_id: &str) -> ApiResult<EnhancedPackage> {
        self.transition_package(
            project_id,
            package_id,
            PackageStatus::Shipped,
            NoticeKind::PackageShipped,
        )
        .await
    }

    /// 推进构件状态
    ///
    /// 完工状态变化时同步回写加工包的 pieces_complete。
    #[instrument(skip(self))]
    pub async fn advance_piece(
        &self,
        project_id: &str,
        piece_id: &str,
        target: PieceStatus,
    ) -> ApiResult<FabricationItem> {
        let mut piece = self
            .stores
            .fabrication
            .get_piece(piece_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("FabricationItem(id={})不存在", piece_id)))?;
        let package = self.load_package(project_id, &piece.package_id).await?;
        let (drawings, rfis) = self.load_drawings_and_rfis(project_id).await?;

        let verdict = self.evaluator.evaluate_piece(&piece, &package, &drawings, &rfis);

        match TransitionGuard::check_piece_transition(&piece, target, &verdict) {
            Ok(TransitionDecision::NoOp) => Ok(piece),
            Ok(TransitionDecision::Allowed) => {
                let was_complete = piece.status.is_complete();
                let patch = PiecePatch::status(target);
                self.stores.fabrication.update_piece(piece_id, &patch).await?;
                let from = piece.status;
                patch.apply_to(&mut piece);

                if was_complete != target.is_complete() {
                    let pieces = self.stores.fabrication.list_pieces(&package.id).await?;
                    let complete = PackageAggregator::count_complete(&pieces) as u32;
                    self.stores
                        .fabrication
                        .update_package(
                            &package.id,
                            &PackagePatch {
                                pieces_complete: Some(complete),
                                ..Default::default()
                            },
                        )
                        .await?;
                }

                info!(piece_id, from = %from, to = %target, "构件状态已更新");
                self.notifications.publish(EngineNotice::new(
                    NoticeKind::PieceAdvanced,
                    piece_id,
                    format!("{}: {} -> {}", piece.piece_mark, from, target),
                ));
                Ok(piece)
            }
            Err(rejection) => {
                self.publish_blocked(piece_id, &rejection);
                Err(ApiError::TransitionBlocked(rejection))
            }
        }
    }

    /// 设置/解除构件暂扣
    #[instrument(skip(self))]
    pub async fn set_piece_hold(&self, piece_id: &str, on_hold: bool) -> ApiResult<FabricationItem> {
        let mut piece = self
            .stores
            .fabrication
            .get_piece(piece_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("FabricationItem(id={})不存在", piece_id)))?;

        if piece.on_hold == on_hold {
            return Ok(piece);
        }

        let patch = PiecePatch {
            status: None,
            on_hold: Some(on_hold),
        };
        self.stores.fabrication.update_piece(piece_id, &patch).await?;
        patch.apply_to(&mut piece);
        info!(piece_id, on_hold, "构件暂扣状态已更新");
        Ok(piece)
    }
}
