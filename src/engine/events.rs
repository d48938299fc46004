// ==========================================
// 钢结构项目管理 - 引擎层通知发布
// ==========================================
// 职责: 定义通知发布 trait,实现依赖倒置
// 说明: 引擎不直接发送通知,只产出判定/拒绝;调用方实现 sink 落地为提示或审计记录
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// 通知类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeKind {
    /// 加工包已放行
    PackageReleased,
    /// 加工包已发运
    PackageShipped,
    /// 构件状态推进
    PieceAdvanced,
    /// 状态流转被阻断
    TransitionBlocked,
    /// 计量编辑被拒绝
    BillingEditRejected,
    /// 计量写入失败已回滚
    BillingEditRolledBack,
    /// 检测到超开票
    OverbillingDetected,
}

impl NoticeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NoticeKind::PackageReleased => "PackageReleased",
            NoticeKind::PackageShipped => "PackageShipped",
            NoticeKind::PieceAdvanced => "PieceAdvanced",
            NoticeKind::TransitionBlocked => "TransitionBlocked",
            NoticeKind::BillingEditRejected => "BillingEditRejected",
            NoticeKind::BillingEditRolledBack => "BillingEditRolledBack",
            NoticeKind::OverbillingDetected => "OverbillingDetected",
        }
    }
}

/// 引擎通知
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineNotice {
    pub notice_id: String,
    pub kind: NoticeKind,
    pub entity_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl EngineNotice {
    pub fn new(kind: NoticeKind, entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            notice_id: Uuid::new_v4().to_string(),
            kind,
            entity_id: entity_id.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

// ==========================================
// 通知发布 Trait
// ==========================================

/// 通知发布者 Trait
///
/// 由宿主实现(界面提示 / 审计记录)。
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notice: EngineNotice) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作通知发布者
///
/// 用于不需要通知的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpNotificationSink;

impl NotificationSink for NoOpNotificationSink {
    fn publish(&self, notice: EngineNotice) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpNotificationSink: 跳过通知 - kind={}, entity={}",
            notice.kind.as_str(),
            notice.entity_id
        );
        Ok(())
    }
}

/// 可选的通知发布者包装
///
/// 简化 Option<Arc<dyn NotificationSink>> 的使用;发布失败只记日志。
#[derive(Clone, Default)]
pub struct OptionalNotificationSink {
    inner: Option<Arc<dyn NotificationSink>>,
}

impl OptionalNotificationSink {
    pub fn new(sink: Option<Arc<dyn NotificationSink>>) -> Self {
        Self { inner: sink }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn publish(&self, notice: EngineNotice) {
        let Some(sink) = &self.inner else {
            return;
        };
        let kind = notice.kind;
        let entity_id = notice.entity_id.clone();
        if let Err(e) = sink.publish(notice) {
            tracing::warn!(
                "通知发布失败(忽略): kind={}, entity={}, error={}",
                kind.as_str(),
                entity_id,
                e
            );
        }
    }
}
