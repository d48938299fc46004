// ==========================================
// 钢结构项目管理 - 计量台账引擎
// ==========================================
// 红线: 已锁定计量行的合同价不可修改
// 红线: 已锁定计量行的完成百分比不可下调
// 红线: 超开票只提示,不阻断
// ==========================================
// 职责: 计量行编辑校验 + 挣值/已开票/待开票派生指标
// 锁定口径: 被已审批/已付款发票行引用的计量行(逐行判断)
// ==========================================

use crate::domain::billing::{InvoiceLine, SovItem, SovPatch};
use crate::i18n::t_with_args;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

/// 百分比上限
const PERCENT_MAX: Decimal = Decimal::ONE_HUNDRED;

/// 合同价上限: 与 100% 相乘不溢出
fn max_scheduled_value() -> Decimal {
    Decimal::MAX / PERCENT_MAX
}

// ==========================================
// SovEdit - 计量行编辑(边界处解码一次)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum SovEdit {
    ScheduledValue(Decimal),
    PercentComplete(Decimal),
    Description(String),
    Category(String),
}

impl SovEdit {
    /// 从字段名 + 原始值解码
    ///
    /// # 规则
    /// - scheduled_value / percent_complete: JSON 数字或数字字符串,否则 InvalidRange
    /// - description / category: 字符串
    /// - 其他字段: UnknownField
    pub fn from_field(field: &str, raw: &JsonValue) -> Result<Self, RejectionReason> {
        match field {
            "scheduled_value" => Ok(SovEdit::ScheduledValue(parse_numeric(field, raw)?)),
            "percent_complete" => Ok(SovEdit::PercentComplete(parse_numeric(field, raw)?)),
            "description" | "category" => {
                let text = match raw {
                    JsonValue::String(s) => s.trim().to_string(),
                    JsonValue::Null => String::new(),
                    other => other.to_string(),
                };
                if field == "description" {
                    Ok(SovEdit::Description(text))
                } else {
                    Ok(SovEdit::Category(text))
                }
            }
            other => Err(RejectionReason::UnknownField {
                field: other.to_string(),
            }),
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            SovEdit::ScheduledValue(_) => "scheduled_value",
            SovEdit::PercentComplete(_) => "percent_complete",
            SovEdit::Description(_) => "description",
            SovEdit::Category(_) => "category",
        }
    }
}

fn parse_numeric(field: &str, raw: &JsonValue) -> Result<Decimal, RejectionReason> {
    let text = match raw {
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.trim().to_string(),
        _ => String::new(),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| RejectionReason::InvalidRange {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

// ==========================================
// RejectionReason - 编辑拒绝原因
// ==========================================
// 均为可恢复的业务拒绝,由调用方提示用户
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    #[error("数值超出范围: {field}={value}")]
    InvalidRange { field: String, value: String },

    #[error("已锁定字段不可修改: {field}")]
    LockedField { field: String },

    #[error("已锁定计量行完成百分比不可下调: {current} -> {requested}")]
    LockedDecrease { current: Decimal, requested: Decimal },

    #[error("字段不可编辑: {field}")]
    UnknownField { field: String },
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InvalidRange { .. } => "INVALID_RANGE",
            RejectionReason::LockedField { .. } => "LOCKED_FIELD",
            RejectionReason::LockedDecrease { .. } => "LOCKED_DECREASE",
            RejectionReason::UnknownField { .. } => "UNKNOWN_FIELD",
        }
    }

    /// 按当前语言渲染拒绝说明
    pub fn message(&self) -> String {
        match self {
            RejectionReason::InvalidRange { field, value } => t_with_args(
                "billing.invalid_range",
                &[("field", field), ("value", value)],
            ),
            RejectionReason::LockedField { field } => {
                t_with_args("billing.locked_field", &[("field", field)])
            }
            RejectionReason::LockedDecrease { current, requested } => t_with_args(
                "billing.locked_decrease",
                &[
                    ("current", &current.normalize().to_string()),
                    ("requested", &requested.normalize().to_string()),
                ],
            ),
            RejectionReason::UnknownField { field } => {
                t_with_args("billing.unknown_field", &[("field", field)])
            }
        }
    }
}

// ==========================================
// LedgerOptions - 台账参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOptions {
    pub money_scale: u32, // 金额展示小数位
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self { money_scale: 2 }
    }
}

// ==========================================
// LineMetrics - 单行派生指标(每次读取时计算,不存储)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMetrics {
    pub sov_item_id: String,
    pub scheduled_value: Decimal,
    pub percent_complete: Decimal,
    pub earned: Decimal,         // 挣值 = 合同价 × 完成% / 100
    pub billed_to_date: Decimal, // 已开票
    pub to_bill: Decimal,        // 待开票 = 挣值 - 已开票(可为负)
    pub overbilled: bool,        // 挣值 < 已开票
    pub locked: bool,
}

// ==========================================
// BillingSummary - 项目计量汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSummary {
    pub lines: Vec<LineMetrics>,
    pub total_scheduled: Decimal,
    pub total_earned: Decimal,
    pub total_billed: Decimal,
    pub total_to_bill: Decimal,
    pub overall_percent_complete: Decimal,
    pub has_overbilling: bool, // 驱动提示条,不阻断
    pub overbilled_item_ids: Vec<String>,
    pub locked_count: usize,
}

impl BillingSummary {
    pub fn overbilling_message(&self) -> Option<String> {
        if !self.has_overbilling {
            return None;
        }
        Some(t_with_args(
            "billing.overbilled",
            &[("count", &self.overbilled_item_ids.len().to_string())],
        ))
    }
}

// ==========================================
// BillingLedger - 计量台账引擎
// ==========================================
// 红线: 不直接写库,只校验并返回补丁
#[derive(Debug, Clone, Default)]
pub struct BillingLedger {
    options: LedgerOptions,
}

impl BillingLedger {
    pub fn new(options: LedgerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    /// 计算锁定的计量行集合
    ///
    /// 被已审批/已付款发票行引用的计量行即锁定。
    pub fn locked_item_ids(invoice_lines: &[InvoiceLine]) -> HashSet<String> {
        invoice_lines
            .iter()
            .filter(|line| line.locks_sov_item())
            .map(|line| line.sov_item_id.clone())
            .collect()
    }

    /// 校验计量行编辑
    ///
    /// # 校验顺序
    /// 1. percent_complete 必须在 [0, 100];scheduled_value 绝对值不超过 Decimal::MAX / 100 → InvalidRange
    /// 2. 锁定行: 合同价任何修改 → LockedField;完成% 下调 → LockedDecrease
    /// 3. 其他情况接受
    ///
    /// # 说明
    /// - 锁定只看本行,不推导项目级锁定
    /// - 超开票不在此处阻断
    pub fn propose_update(
        &self,
        item: &SovItem,
        edit: &SovEdit,
        locked_item_ids: &HashSet<String>,
    ) -> Result<SovPatch, RejectionReason> {
        // === 步骤 1: 范围检查 ===
        let range_error = |value: &Decimal| RejectionReason::InvalidRange {
            field: edit.field_name().to_string(),
            value: value.to_string(),
        };
        match edit {
            SovEdit::PercentComplete(value) if *value < Decimal::ZERO || *value > PERCENT_MAX => {
                return Err(range_error(value));
            }
            SovEdit::ScheduledValue(value) if value.abs() > max_scheduled_value() => {
                return Err(range_error(value));
            }
            _ => {}
        }

        // === 步骤 2: 锁定检查 ===
        if locked_item_ids.contains(&item.id) {
            match edit {
                SovEdit::ScheduledValue(_) => {
                    return Err(RejectionReason::LockedField {
                        field: edit.field_name().to_string(),
                    });
                }
                SovEdit::PercentComplete(value) if *value < item.percent_complete => {
                    return Err(RejectionReason::LockedDecrease {
                        current: item.percent_complete,
                        requested: *value,
                    });
                }
                _ => {}
            }
        }

        // === 步骤 3: 生成补丁 ===
        let patch = match edit {
            SovEdit::ScheduledValue(value) => SovPatch {
                scheduled_value: Some(*value),
                ..Default::default()
            },
            SovEdit::PercentComplete(value) => SovPatch {
                percent_complete: Some(*value),
                ..Default::default()
            },
            SovEdit::Description(text) => SovPatch {
                description: Some(text.clone()),
                ..Default::default()
            },
            SovEdit::Category(text) => SovPatch {
                category: Some(text.clone()),
                ..Default::default()
            },
        };

        Ok(patch)
    }

    /// 挣值(未舍入)
    ///
    /// 存储端数据未经本引擎校验,乘法溢出时按饱和值计算。
    pub fn earned_raw(item: &SovItem) -> Decimal {
        item.scheduled_value.saturating_mul(item.percent_complete) / PERCENT_MAX
    }

    /// 单行派生指标
    pub fn line_metrics(&self, item: &SovItem, locked: bool) -> LineMetrics {
        let earned = Self::earned_raw(item);
        let to_bill = earned.saturating_sub(item.billed_to_date);

        LineMetrics {
            sov_item_id: item.id.clone(),
            scheduled_value: self.round_money(item.scheduled_value),
            percent_complete: item.percent_complete,
            earned: self.round_money(earned),
            billed_to_date: self.round_money(item.billed_to_date),
            to_bill: self.round_money(to_bill),
            overbilled: earned < item.billed_to_date,
            locked,
        }
    }

    /// 项目计量汇总
    ///
    /// 合计按未舍入值累加,最后统一舍入一次。
    pub fn summarize(&self, items: &[SovItem], locked_item_ids: &HashSet<String>) -> BillingSummary {
        let mut total_scheduled = Decimal::ZERO;
        let mut total_earned = Decimal::ZERO;
        let mut total_billed = Decimal::ZERO;
        let mut lines = Vec::with_capacity(items.len());
        let mut overbilled_item_ids = Vec::new();
        let mut locked_count = 0;

        for item in items {
            let locked = locked_item_ids.contains(&item.id);
            let metrics = self.line_metrics(item, locked);

            total_scheduled = total_scheduled.saturating_add(item.scheduled_value);
            total_earned = total_earned.saturating_add(Self::earned_raw(item));
            total_billed = total_billed.saturating_add(item.billed_to_date);

            if metrics.overbilled {
                overbilled_item_ids.push(item.id.clone());
            }
            if locked {
                locked_count += 1;
            }
            lines.push(metrics);
        }

        let overall_percent_complete = if total_scheduled.is_zero() {
            Decimal::ZERO
        } else {
            total_earned
                .checked_div(total_scheduled)
                .map(|ratio| ratio.saturating_mul(PERCENT_MAX))
                .unwrap_or(Decimal::ZERO)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        let has_overbilling = !overbilled_item_ids.is_empty();
        if has_overbilling {
            tracing::warn!("检测到超开票: lines={:?}", overbilled_item_ids);
        }

        BillingSummary {
            lines,
            total_scheduled: self.round_money(total_scheduled),
            total_earned: self.round_money(total_earned),
            total_billed: self.round_money(total_billed),
            total_to_bill: self.round_money(total_earned.saturating_sub(total_billed)),
            overall_percent_complete,
            has_overbilling,
            overbilled_item_ids,
            locked_count,
        }
    }

    fn round_money(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.options.money_scale, RoundingStrategy::MidpointAwayFromZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::InvoiceStatus;
    use serde_json::json;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn sov(id: &str, scheduled: &str, pct: &str, billed: &str) -> SovItem {
        SovItem {
            id: id.to_string(),
            project_id: "P1".to_string(),
            sov_code: format!("SOV-{}", id),
            description: "Erection".to_string(),
            category: Some("labor".to_string()),
            scheduled_value: dec(scheduled),
            percent_complete: dec(pct),
            billed_to_date: dec(billed),
        }
    }

    fn locked(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_edit_values() {
        assert_eq!(
            SovEdit::from_field("percent_complete", &json!(80)).unwrap(),
            SovEdit::PercentComplete(dec("80"))
        );
        assert_eq!(
            SovEdit::from_field("scheduled_value", &json!(" 1250.50 ")).unwrap(),
            SovEdit::ScheduledValue(dec("1250.50"))
        );
        assert!(matches!(
            SovEdit::from_field("percent_complete", &json!("eighty")),
            Err(RejectionReason::InvalidRange { .. })
        ));
        assert!(matches!(
            SovEdit::from_field("percent_complete", &json!(null)),
            Err(RejectionReason::InvalidRange { .. })
        ));
        assert!(matches!(
            SovEdit::from_field("billed_to_date", &json!(10)),
            Err(RejectionReason::UnknownField { .. })
        ));
    }

    #[test]
    fn test_percent_out_of_range_rejected_before_lock_check() {
        let ledger = BillingLedger::default();
        let item = sov("A", "1000", "50", "0");

        let err = ledger
            .propose_update(&item, &SovEdit::PercentComplete(dec("101")), &locked(&["A"]))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_RANGE");

        let err = ledger
            .propose_update(&item, &SovEdit::PercentComplete(dec("-1")), &HashSet::new())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_RANGE");
    }

    #[test]
    fn test_locked_line_rules() {
        let ledger = BillingLedger::default();
        let item = sov("A", "5000", "80", "4000");
        let lock = locked(&["A"]);

        assert_eq!(
            ledger.propose_update(&item, &SovEdit::ScheduledValue(dec("5000")), &lock),
            Err(RejectionReason::LockedField {
                field: "scheduled_value".to_string()
            })
        );
        assert_eq!(
            ledger.propose_update(&item, &SovEdit::PercentComplete(dec("60")), &lock),
            Err(RejectionReason::LockedDecrease {
                current: dec("80"),
                requested: dec("60"),
            })
        );
        assert!(ledger
            .propose_update(&item, &SovEdit::PercentComplete(dec("80")), &lock)
            .is_ok());
        assert!(ledger
            .propose_update(&item, &SovEdit::Description("Erection - phase 2".to_string()), &lock)
            .is_ok());
    }

    #[test]
    fn test_lock_is_per_line() {
        let ledger = BillingLedger::default();
        let item = sov("B", "5000", "80", "0");
        let patch = ledger
            .propose_update(&item, &SovEdit::PercentComplete(dec("10")), &locked(&["A"]))
            .unwrap();
        assert_eq!(patch.percent_complete, Some(dec("10")));
    }

    #[test]
    fn test_locked_ids_from_invoice_lines() {
        let line = |sov_id: &str, status: InvoiceStatus| InvoiceLine {
            id: format!("L-{}-{}", sov_id, status),
            invoice_id: "INV-1".to_string(),
            sov_item_id: sov_id.to_string(),
            invoice_status: status,
            amount: dec("100"),
        };
        let lines = vec![
            line("A", InvoiceStatus::Approved),
            line("B", InvoiceStatus::Draft),
            line("C", InvoiceStatus::Paid),
            line("D", InvoiceStatus::Void),
        ];
        assert_eq!(BillingLedger::locked_item_ids(&lines), locked(&["A", "C"]));
    }

    #[test]
    fn test_overbilling_is_advisory() {
        let ledger = BillingLedger::default();
        let item = sov("A", "1000", "40", "600");
        let patch = ledger
            .propose_update(&item, &SovEdit::PercentComplete(dec("50")), &HashSet::new())
            .unwrap();

        let mut updated = item.clone();
        patch.apply_to(&mut updated);
        let metrics = ledger.line_metrics(&updated, false);

        assert_eq!(metrics.earned, dec("500"));
        assert_eq!(metrics.to_bill, dec("-100"));
        assert!(metrics.overbilled);
    }

    #[test]
    fn test_totals_round_once() {
        let ledger = BillingLedger::default();
        // 每行挣值 0.005,逐行舍入为 0.01,合计应为 0.02 而不是 0.03
        let items = vec![
            sov("A", "1", "0.5", "0"),
            sov("B", "1", "0.5", "0"),
            sov("C", "1", "0.5", "0"),
        ];
        let summary = ledger.summarize(&items, &HashSet::new());

        assert_eq!(summary.lines[0].earned, dec("0.01"));
        assert_eq!(summary.total_earned, dec("0.02"));
        assert_eq!(summary.total_scheduled, dec("3"));
        assert_eq!(summary.overall_percent_complete, dec("0.5"));
        assert!(!summary.has_overbilling);
    }

    #[test]
    fn test_summary_flags() {
        let ledger = BillingLedger::default();
        let items = vec![sov("A", "1000", "50", "600"), sov("B", "2000", "100", "2000")];
        let summary = ledger.summarize(&items, &locked(&["B"]));

        assert!(summary.has_overbilling);
        assert_eq!(summary.overbilled_item_ids, vec!["A".to_string()]);
        assert_eq!(summary.locked_count, 1);
        assert_eq!(summary.total_to_bill, dec("-100"));
        assert!(summary.overbilling_message().is_some());
        assert!(summary.lines[1].locked);
    }

    #[test]
    fn test_oversized_scheduled_value_is_rejected() {
        let ledger = BillingLedger::default();
        let item = sov("A", "1000", "50", "0");

        let edit = SovEdit::from_field("scheduled_value", &json!("1000000000000000000000000000")).unwrap();
        let err = ledger.propose_update(&item, &edit, &HashSet::new()).unwrap_err();
        assert_eq!(err.code(), "INVALID_RANGE");

        let largest = Decimal::MAX / Decimal::ONE_HUNDRED;
        let patch = ledger
            .propose_update(&item, &SovEdit::ScheduledValue(largest), &HashSet::new())
            .unwrap();
        let mut updated = item.clone();
        patch.apply_to(&mut updated);
        updated.percent_complete = dec("100");
        assert_eq!(ledger.line_metrics(&updated, false).earned, largest.round_dp(2));
    }

    #[test]
    fn test_metrics_saturate_on_stored_extremes() {
        let ledger = BillingLedger::default();
        // 存储端直接给出的极值不经 propose_update
        let mut huge = sov("A", "0", "100", "0");
        huge.scheduled_value = Decimal::MAX;
        let items = vec![huge.clone(), huge];

        let summary = ledger.summarize(&items, &HashSet::new());
        assert_eq!(summary.total_scheduled, Decimal::MAX);
        assert_eq!(summary.lines.len(), 2);
        assert!(!summary.has_overbilling);
    }

    #[test]
    fn test_empty_summary() {
        let summary = BillingLedger::default().summarize(&[], &HashSet::new());
        assert_eq!(summary.total_scheduled, Decimal::ZERO);
        assert_eq!(summary.overall_percent_complete, Decimal::ZERO);
    }
}
