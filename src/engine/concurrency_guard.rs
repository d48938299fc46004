// ==========================================
// 钢结构项目管理 - 计量编辑乐观更新守卫
// ==========================================
// 流程: 校验 -> 快照 -> 乐观补丁 -> 写存储 -> 保留或回滚
// 红线: 视图不得长期停留在"已乐观更新但未确认"状态
// 红线: 同一计量行同时只允许一个未决编辑,不同行可并发
// 说明: 同一行跨用户并发以存储层后写为准,不做合并
// ==========================================

use crate::domain::billing::{SovItem, SovPatch};
use crate::engine::billing_ledger::{BillingLedger, RejectionReason, SovEdit};
use crate::repository::error::RepositoryError;
use crate::repository::traits::BillingStore;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

// ==========================================
// SovViewCache - 调用方展示的计量行视图
// ==========================================
/// 锁只在同步代码中持有,从不跨越 await
#[derive(Debug, Clone, Default)]
pub struct SovViewCache {
    items: Arc<Mutex<HashMap<String, SovItem>>>,
}

impl SovViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<SovItem>) -> Self {
        let cache = Self::new();
        cache.replace_all(items);
        cache
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SovItem>> {
        // 视图数据在任何写入点都是完整记录,中毒后仍可继续使用
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 用存储快照整体替换视图
    pub fn replace_all(&self, items: Vec<SovItem>) {
        let mut guard = self.lock();
        guard.clear();
        for item in items {
            guard.insert(item.id.clone(), item);
        }
    }

    pub fn get(&self, item_id: &str) -> Option<SovItem> {
        self.lock().get(item_id).cloned()
    }

    pub fn put(&self, item: SovItem) {
        self.lock().insert(item.id.clone(), item);
    }

    /// 按 sov_code, id 排序的视图副本
    pub fn items(&self) -> Vec<SovItem> {
        let mut items: Vec<SovItem> = self.lock().values().cloned().collect();
        items.sort_by(|a, b| a.sov_code.cmp(&b.sov_code).then_with(|| a.id.cmp(&b.id)));
        items
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 仅当视图仍是 expected 时才恢复为 snapshot
    ///
    /// 编辑未决期间视图被整体重载过,则保留重载结果。
    fn restore_if_unchanged(&self, expected: &SovItem, snapshot: &SovItem) -> bool {
        let mut guard = self.lock();
        match guard.get(&snapshot.id) {
            Some(current) if current == expected => {
                guard.insert(snapshot.id.clone(), snapshot.clone());
                true
            }
            _ => false,
        }
    }
}

// ==========================================
// GuardError - 提交失败
// ==========================================
#[derive(Debug, Error)]
pub enum GuardError {
    /// 业务规则拒绝(视图未改动)
    #[error("{0}")]
    Rejected(#[from] RejectionReason),

    #[error("计量行不在当前视图中: {item_id}")]
    NotFound { item_id: String },

    #[error("计量行已有未完成的编辑: {item_id}")]
    EditInFlight { item_id: String },

    /// 存储写入失败,视图已回滚到编辑前快照
    #[error("计量行写入失败 (item={item_id}, rolled_back={rolled_back}): {source}")]
    WriteFailed {
        item_id: String,
        rolled_back: bool,
        #[source]
        source: RepositoryError,
    },
}

impl GuardError {
    /// 只有存储写入失败值得重试;规则拒绝需要用户修改输入
    pub fn is_retryable(&self) -> bool {
        matches!(self, GuardError::WriteFailed { .. })
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            GuardError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// 提交成功: 视图已保留乐观补丁
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOutcome {
    pub item: SovItem,
    pub patch: SovPatch,
}

// ==========================================
// 未决编辑登记(每行一个)
// ==========================================
struct InFlightClaim {
    registry: Arc<Mutex<HashSet<String>>>,
    item_id: String,
}

impl InFlightClaim {
    fn acquire(registry: &Arc<Mutex<HashSet<String>>>, item_id: &str) -> Option<Self> {
        let mut guard = registry.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.insert(item_id.to_string()) {
            return None;
        }
        Some(Self {
            registry: Arc::clone(registry),
            item_id: item_id.to_string(),
        })
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        let mut guard = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&self.item_id);
    }
}

// ==========================================
// 乐观补丁回滚守卫
// ==========================================
// 未确认即被释放(写入任务 panic)时恢复快照,恢复结果记入 restored
struct PendingEdit {
    cache: SovViewCache,
    snapshot: SovItem,
    optimistic: SovItem,
    resolved: bool,
    restored: Arc<AtomicBool>,
}

impl PendingEdit {
    fn apply(cache: SovViewCache, snapshot: SovItem, optimistic: SovItem) -> Self {
        cache.put(optimistic.clone());
        Self {
            cache,
            snapshot,
            optimistic,
            resolved: false,
            restored: Arc::new(AtomicBool::new(false)),
        }
    }

    fn restored_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.restored)
    }

    fn confirm(mut self) -> SovItem {
        self.resolved = true;
        self.optimistic.clone()
    }

    fn roll_back(mut self) -> bool {
        self.resolved = true;
        let restored = self.cache.restore_if_unchanged(&self.optimistic, &self.snapshot);
        self.restored.store(restored, Ordering::Release);
        restored
    }
}

impl Drop for PendingEdit {
    fn drop(&mut self) {
        if !self.resolved {
            let restored = self.cache.restore_if_unchanged(&self.optimistic, &self.snapshot);
            self.restored.store(restored, Ordering::Release);
            warn!(
                item_id = %self.snapshot.id,
                restored,
                "计量行编辑未确认即中止"
            );
        }
    }
}

// ==========================================
// ConcurrencyGuard - 乐观更新守卫
// ==========================================
#[derive(Clone)]
pub struct ConcurrencyGuard {
    ledger: BillingLedger,
    store: Arc<dyn BillingStore>,
    cache: SovViewCache,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ConcurrencyGuard {
    pub fn new(ledger: BillingLedger, store: Arc<dyn BillingStore>, cache: SovViewCache) -> Self {
        Self {
            ledger,
            store,
            cache,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn cache(&self) -> &SovViewCache {
        &self.cache
    }

    pub fn ledger(&self) -> &BillingLedger {
        &self.ledger
    }

    pub fn is_in_flight(&self, item_id: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(item_id)
    }

    /// 提交一次字段编辑
    ///
    /// # 流程
    /// 1. 登记未决编辑(同一行已有未决编辑则 EditInFlight)
    /// 2. BillingLedger 校验生成补丁(拒绝时视图不变)
    /// 3. 快照 + 乐观补丁写入视图
    /// 4. 在独立任务中写存储,成功保留补丁,失败恢复快照
    ///
    /// 写入任务独立于调用方运行: 调用方放弃等待后,
    /// 保留或回滚仍会在写入结束时完成。
    pub async fn commit(
        &self,
        item_id: &str,
        edit: SovEdit,
        locked_item_ids: &HashSet<String>,
    ) -> Result<CommitOutcome, GuardError> {
        let claim = InFlightClaim::acquire(&self.in_flight, item_id).ok_or_else(|| {
            GuardError::EditInFlight {
                item_id: item_id.to_string(),
            }
        })?;

        let current = self.cache.get(item_id).ok_or_else(|| GuardError::NotFound {
            item_id: item_id.to_string(),
        })?;

        let patch = match self.ledger.propose_update(&current, &edit, locked_item_ids) {
            Ok(patch) => patch,
            Err(reason) => {
                debug!(item_id, code = reason.code(), "计量行编辑被拒绝");
                return Err(GuardError::Rejected(reason));
            }
        };

        let mut optimistic = current.clone();
        patch.apply_to(&mut optimistic);
        let pending = PendingEdit::apply(self.cache.clone(), current, optimistic);
        let restored = pending.restored_flag();

        let store = Arc::clone(&self.store);
        let write_id = item_id.to_string();
        let write_patch = patch.clone();
        let handle = tokio::spawn(async move {
            // 登记与回滚守卫随任务结束释放
            let _claim = claim;
            match store.update_sov_item(&write_id, &write_patch).await {
                Ok(()) => Ok(pending.confirm()),
                Err(source) => {
                    let rolled_back = pending.roll_back();
                    Err((rolled_back, source))
                }
            }
        });

        match handle.await {
            Ok(Ok(item)) => {
                info!(item_id, field = edit.field_name(), "计量行编辑已确认");
                Ok(CommitOutcome { item, patch })
            }
            Ok(Err((rolled_back, source))) => {
                warn!(item_id, rolled_back, error = %source, "计量行写入失败,已回滚");
                Err(GuardError::WriteFailed {
                    item_id: item_id.to_string(),
                    rolled_back,
                    source,
                })
            }
            Err(join_err) => {
                // 任务终止前 PendingEdit 已析构,restored 已写入
                let rolled_back = restored.load(Ordering::Acquire);
                warn!(item_id, rolled_back, error = %join_err, "计量行写入任务异常终止");
                Err(GuardError::WriteFailed {
                    item_id: item_id.to_string(),
                    rolled_back,
                    source: RepositoryError::InternalError(format!("写入任务异常终止: {}", join_err)),
                })
            }
        }
    }
}
