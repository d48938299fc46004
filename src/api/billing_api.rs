// ==========================================
// 钢结构项目管理 - 计量 API
// ==========================================
// 职责: 计量视图加载、汇总、行编辑
// 红线: 行编辑必须经 ConcurrencyGuard,写入失败时视图回滚
// 红线: 超开票只提示,不阻断
// ==========================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value as JsonValue;
use tracing::{instrument, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::engine_config_trait::EngineConfigReader;
use crate::domain::billing::SovItem;
use crate::engine::billing_ledger::{BillingLedger, BillingSummary, LineMetrics, SovEdit};
use crate::engine::concurrency_guard::{ConcurrencyGuard, GuardError, SovViewCache};
use crate::engine::events::{EngineNotice, NoticeKind, OptionalNotificationSink};
use crate::repository::traits::BillingStore;

// ==========================================
// BillingApi - 计量 API
// ==========================================
pub struct BillingApi {
    store: Arc<dyn BillingStore>,
    guard: ConcurrencyGuard,
    locked_item_ids: Mutex<HashSet<String>>,
    notifications: OptionalNotificationSink,
}

impl BillingApi {
    pub fn new(
        store: Arc<dyn BillingStore>,
        ledger: BillingLedger,
        notifications: OptionalNotificationSink,
    ) -> Self {
        let guard = ConcurrencyGuard::new(ledger, Arc::clone(&store), SovViewCache::new());
        Self {
            store,
            guard,
            locked_item_ids: Mutex::new(HashSet::new()),
            notifications,
        }
    }

    /// 按配置构建台账参数
    pub async fn from_config<C>(
        store: Arc<dyn BillingStore>,
        config: &C,
        notifications: OptionalNotificationSink,
    ) -> ApiResult<Self>
    where
        C: EngineConfigReader + ?Sized,
    {
        let options = config
            .ledger_options()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(Self::new(store, BillingLedger::new(options), notifications))
    }

    pub fn guard(&self) -> &ConcurrencyGuard {
        &self.guard
    }

    /// 当前视图中的计量行
    pub fn items(&self) -> Vec<SovItem> {
        self.guard.cache().items()
    }

    /// 当前锁定行集合(最近一次加载/编辑时的发票状态)
    pub fn locked_item_ids(&self) -> HashSet<String> {
        self.locked_item_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_locked(&self, locked: HashSet<String>) {
        *self
            .locked_item_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = locked;
    }

    /// 从发票行重新计算锁定集合
    async fn refresh_locked(&self, project_id: &str) -> ApiResult<HashSet<String>> {
        let lines = self.store.list_invoice_lines(project_id).await?;
        let locked = BillingLedger::locked_item_ids(&lines);
        self.store_locked(locked.clone());
        Ok(locked)
    }

    fn publish_overbilling(&self, project_id: &str, summary: &BillingSummary) {
        if let Some(message) = summary.overbilling_message() {
            self.notifications.publish(EngineNotice::new(
                NoticeKind::OverbillingDetected,
                project_id,
                message,
            ));
        }
    }

    /// 加载项目计量视图并返回汇总
    #[instrument(skip(self))]
    pub async fn load(&self, project_id: &str) -> ApiResult<BillingSummary> {
        let (items, lines) = futures::try_join!(
            self.store.list_sov_items(project_id),
            self.store.list_invoice_lines(project_id),
        )?;

        let locked = BillingLedger::locked_item_ids(&lines);
        self.guard.cache().replace_all(items);
        self.store_locked(locked);

        let summary = self.summary();
        self.publish_overbilling(project_id, &summary);
        Ok(summary)
    }

    /// 基于当前视图的汇总(每次重新计算)
    pub fn summary(&self) -> BillingSummary {
        let locked = self.locked_item_ids();
        self.guard.ledger().summarize(&self.items(), &locked)
    }

    /// 编辑一行的一个字段
    ///
    /// # 参数
    /// - field: scheduled_value / percent_complete / description / category
    /// - raw_value: 用户输入的原始值(数字或数字字符串)
    ///
    /// # 返回
    /// - Ok(LineMetrics): 写入确认后的行指标
    /// - Err(ApiError::EditRejected): 业务拒绝,视图未变
    /// - Err(ApiError::StoreWriteFailed): 写入失败,视图已回滚,可重试
    #[instrument(skip(self, raw_value))]
    pub async fn update_line(
        &self,
        project_id: &str,
        item_id: &str,
        field: &str,
        raw_value: &JsonValue,
    ) -> ApiResult<LineMetrics> {
        let edit = match SovEdit::from_field(field, raw_value) {
            Ok(edit) => edit,
            Err(reason) => {
                warn!(item_id, code = reason.code(), "计量行输入无法解析");
                self.notifications.publish(EngineNotice::new(
                    NoticeKind::BillingEditRejected,
                    item_id,
                    reason.message(),
                ));
                return Err(ApiError::EditRejected(reason));
            }
        };

        // 锁定只由发票状态决定,编辑前按最新发票状态重算
        let locked = self.refresh_locked(project_id).await?;

        match self.guard.commit(item_id, edit, &locked).await {
            Ok(outcome) => {
                let metrics = self
                    .guard
                    .ledger()
                    .line_metrics(&outcome.item, locked.contains(item_id));
                if metrics.overbilled {
                    let summary = self.summary();
                    self.publish_overbilling(project_id, &summary);
                }
                Ok(metrics)
            }
            Err(err) => {
                match &err {
                    GuardError::Rejected(reason) => {
                        self.notifications.publish(EngineNotice::new(
                            NoticeKind::BillingEditRejected,
                            item_id,
                            reason.message(),
                        ));
                    }
                    GuardError::WriteFailed { .. } => {
                        self.notifications.publish(EngineNotice::new(
                            NoticeKind::BillingEditRolledBack,
                            item_id,
                            err.to_string(),
                        ));
                    }
                    GuardError::NotFound { .. } | GuardError::EditInFlight { .. } => {}
                }
                Err(ApiError::from(err))
            }
        }
    }
}
