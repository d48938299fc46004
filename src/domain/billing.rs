// ==========================================
// 钢结构项目管理 - 计量(SOV)领域模型
// ==========================================
// 职责: 合同计量行、发票行快照 + 计量行补丁
// 红线: 已锁定的计量行不得删除
// ==========================================

use crate::domain::types::InvoiceStatus;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// SovItem - 计量行 (Schedule of Values)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SovItem {
    pub id: String,
    pub project_id: String,
    pub sov_code: String,
    pub description: String,
    pub category: Option<String>,

    // ===== 金额 =====
    pub scheduled_value: Decimal,  // 合同价
    pub percent_complete: Decimal, // 完成百分比 [0, 100]
    pub billed_to_date: Decimal,   // 已开票(派生自已审批/已付款发票行)
}

// ==========================================
// InvoiceLine - 发票行
// ==========================================
// invoice_status 由协作存储关联发票表后带出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub sov_item_id: String,
    pub invoice_status: InvoiceStatus,
    pub amount: Decimal,
}

impl InvoiceLine {
    pub fn locks_sov_item(&self) -> bool {
        self.invoice_status.is_locking()
    }
}

// ==========================================
// SovPatch - 计量行字段补丁
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SovPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_value: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SovPatch {
    pub fn apply_to(&self, item: &mut SovItem) {
        if let Some(value) = self.scheduled_value {
            item.scheduled_value = value;
        }
        if let Some(pct) = self.percent_complete {
            item.percent_complete = pct;
        }
        if let Some(desc) = &self.description {
            item.description = desc.clone();
        }
        if let Some(cat) = &self.category {
            item.category = Some(cat.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled_value.is_none()
            && self.percent_complete.is_none()
            && self.description.is_none()
            && self.category.is_none()
    }
}
