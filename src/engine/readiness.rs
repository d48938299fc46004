// ==========================================
// 钢结构项目管理 - 放行就绪判定引擎
// ==========================================
// 红线: 图纸未全部 FFF 或存在未关闭 RFI 时不得放行
// ==========================================
// 职责: 加工包/构件放行就绪判定 + 逐项阻断原因
// 输入: 加工包(或构件+所属加工包) + 项目全部图纸 + 项目全部 RFI
// 输出: ReadinessVerdict (可放行 + 有序阻断列表)
// ==========================================
// 确定性: 相同输入得到内容和顺序完全相同的阻断列表
// ==========================================

use crate::domain::drawing::{DrawingSet, Rfi};
use crate::domain::fabrication::{FabricationItem, FabricationPackage};
use crate::i18n::t_with_args;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::{BTreeSet, HashMap, HashSet};

// ==========================================
// RfiFailureMode - RFI 阻断的上报方式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RfiFailureMode {
    PerRfi,  // 每个未关闭 RFI 一条
    Summary, // 汇总为一条(带数量)
}

// ==========================================
// ReadinessOptions - 判定参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessOptions {
    pub rfi_failure_mode: RfiFailureMode,
    pub include_details: bool,
}

impl Default for ReadinessOptions {
    fn default() -> Self {
        Self {
            rfi_failure_mode: RfiFailureMode::PerRfi,
            include_details: true,
        }
    }
}

// ==========================================
// 阻断严重度 / 阻断原因
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    MissingDrawings, // 未关联图纸 / 关联图纸不存在
    DrawingsNotFff,  // 关联图纸未达 FFF
    OpenRfiBlock,    // 未关闭 RFI
    BomNotVerified,  // 材料清单未核对(仅加工包)
}

// ==========================================
// ReadinessFailure - 单条阻断
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessFailure {
    pub severity: Severity,
    pub reason: FailureReason,
    pub subject_ids: Vec<String>, // 涉及的图纸/RFI ID (已排序)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl ReadinessFailure {
    /// 按当前语言渲染阻断说明
    pub fn message(&self) -> String {
        let ids = self.subject_ids.join(", ");
        match self.reason {
            FailureReason::MissingDrawings if self.subject_ids.is_empty() => {
                t_with_args("readiness.no_drawings", &[])
            }
            FailureReason::MissingDrawings => {
                t_with_args("readiness.missing_drawings", &[("ids", &ids)])
            }
            FailureReason::DrawingsNotFff => {
                t_with_args("readiness.drawings_not_fff", &[("ids", &ids)])
            }
            FailureReason::OpenRfiBlock if self.subject_ids.len() == 1 => {
                t_with_args("readiness.open_rfi", &[("id", &ids)])
            }
            FailureReason::OpenRfiBlock => t_with_args(
                "readiness.open_rfi_summary",
                &[("count", &self.subject_ids.len().to_string())],
            ),
            FailureReason::BomNotVerified => t_with_args("readiness.bom_not_verified", &[]),
        }
    }
}

// ==========================================
// ReadinessVerdict - 判定结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessVerdict {
    pub entity_id: String,
    pub can_release: bool,
    pub failures: Vec<ReadinessFailure>,
}

impl ReadinessVerdict {
    pub fn has_reason(&self, reason: FailureReason) -> bool {
        self.failures.iter().any(|f| f.reason == reason)
    }

    pub fn critical_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.severity == Severity::Critical)
            .count()
    }
}

// ==========================================
// ReadinessEvaluator - 放行就绪判定引擎
// ==========================================
// 无状态纯函数;不对已放行/已发运的对象做特殊处理
#[derive(Debug, Clone, Default)]
pub struct ReadinessEvaluator {
    options: ReadinessOptions,
}

impl ReadinessEvaluator {
    pub fn new(options: ReadinessOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReadinessOptions {
        &self.options
    }

    /// 加工包级判定(含 BOM 核对)
    pub fn evaluate_package(
        &self,
        package: &FabricationPackage,
        drawing_sets: &[DrawingSet],
        rfis: &[Rfi],
    ) -> ReadinessVerdict {
        self.evaluate_core(
            &package.id,
            &package.drawing_set_ids,
            Some(package.bom_verified),
            drawing_sets,
            rfis,
        )
    }

    /// 构件级判定
    ///
    /// 构件使用所属加工包的图纸,不做 BOM 核对。
    pub fn evaluate_piece(
        &self,
        piece: &FabricationItem,
        package: &FabricationPackage,
        drawing_sets: &[DrawingSet],
        rfis: &[Rfi],
    ) -> ReadinessVerdict {
        if piece.package_id != package.id {
            tracing::warn!(
                "构件所属加工包不一致: piece={}, piece.package_id={}, package={}",
                piece.id,
                piece.package_id,
                package.id
            );
        }
        self.evaluate_core(&piece.id, &package.drawing_set_ids, None, drawing_sets, rfis)
    }

    /// 判定核心
    ///
    /// # 步骤
    /// 1. 解析关联图纸(按 ID 升序)
    /// 2. 图纸阻断: 无关联/关联不存在 → 未达 FFF
    /// 3. RFI 阻断: 关联到被引用图纸且未关闭
    /// 4. BOM 阻断(仅加工包,警告级)
    fn evaluate_core(
        &self,
        entity_id: &str,
        drawing_ids: &BTreeSet<String>,
        bom_verified: Option<bool>,
        drawing_sets: &[DrawingSet],
        rfis: &[Rfi],
    ) -> ReadinessVerdict {
        let mut failures = Vec::new();

        // === 步骤 1: 解析关联图纸 ===
        let mut index: HashMap<&str, &DrawingSet> = HashMap::new();
        for drawing in drawing_sets {
            index.entry(drawing.id.as_str()).or_insert(drawing);
        }

        let mut linked: Vec<&DrawingSet> = Vec::new();
        let mut missing_ids: Vec<String> = Vec::new();
        for id in drawing_ids {
            match index.get(id.as_str()) {
                Some(drawing) => linked.push(drawing),
                None => missing_ids.push(id.clone()),
            }
        }

        // === 步骤 2: 图纸阻断 ===
        if linked.is_empty() || !missing_ids.is_empty() {
            failures.push(ReadinessFailure {
                severity: Severity::Critical,
                reason: FailureReason::MissingDrawings,
                details: self.details(|| json!({ "missing_drawing_set_ids": missing_ids })),
                subject_ids: missing_ids.clone(),
            });
        }

        let not_fff: Vec<&DrawingSet> = linked
            .iter()
            .copied()
            .filter(|d| !d.status.is_fabrication_ready())
            .collect();
        if !not_fff.is_empty() {
            failures.push(ReadinessFailure {
                severity: Severity::Critical,
                reason: FailureReason::DrawingsNotFff,
                subject_ids: not_fff.iter().map(|d| d.id.clone()).collect(),
                details: self.details(|| {
                    json!({
                        "drawings": not_fff
                            .iter()
                            .map(|d| json!({ "id": d.id, "status": d.status.as_str() }))
                            .collect::<Vec<_>>(),
                    })
                }),
            });
        }

        let drawings_ready = !linked.is_empty() && missing_ids.is_empty() && not_fff.is_empty();

        // === 步骤 3: RFI 阻断 ===
        // 只看已解析到的图纸;缺失图纸已由步骤 2 报告
        let linked_ids: HashSet<&str> = linked.iter().map(|d| d.id.as_str()).collect();
        let mut open_rfis: Vec<&Rfi> = rfis
            .iter()
            .filter(|rfi| rfi.is_open())
            .filter(|rfi| {
                rfi.linked_drawing_set_id
                    .as_deref()
                    .is_some_and(|id| linked_ids.contains(id))
            })
            .collect();
        open_rfis.sort_by(|a, b| a.id.cmp(&b.id));
        open_rfis.dedup_by(|a, b| a.id == b.id);

        if !open_rfis.is_empty() {
            match self.options.rfi_failure_mode {
                RfiFailureMode::PerRfi => {
                    for rfi in &open_rfis {
                        failures.push(ReadinessFailure {
                            severity: Severity::Critical,
                            reason: FailureReason::OpenRfiBlock,
                            subject_ids: vec![rfi.id.clone()],
                            details: self.details(|| {
                                json!({
                                    "rfi_id": rfi.id,
                                    "drawing_set_id": rfi.linked_drawing_set_id,
                                    "status": rfi.status.as_str(),
                                })
                            }),
                        });
                    }
                }
                RfiFailureMode::Summary => {
                    failures.push(ReadinessFailure {
                        severity: Severity::Critical,
                        reason: FailureReason::OpenRfiBlock,
                        subject_ids: open_rfis.iter().map(|r| r.id.clone()).collect(),
                        details: self.details(|| json!({ "count": open_rfis.len() })),
                    });
                }
            }
        }

        // === 步骤 4: BOM 阻断 ===
        let bom_ok = bom_verified.unwrap_or(true);
        if !bom_ok {
            failures.push(ReadinessFailure {
                severity: Severity::Warning,
                reason: FailureReason::BomNotVerified,
                subject_ids: Vec::new(),
                details: None,
            });
        }

        let can_release = drawings_ready && open_rfis.is_empty() && bom_ok;

        tracing::debug!(
            "就绪判定: entity={}, can_release={}, linked_drawings={}, open_rfis={}, failures={}",
            entity_id,
            can_release,
            linked.len(),
            open_rfis.len(),
            failures.len()
        );

        ReadinessVerdict {
            entity_id: entity_id.to_string(),
            can_release,
            failures,
        }
    }

    fn details(&self, build: impl FnOnce() -> JsonValue) -> Option<JsonValue> {
        if self.options.include_details {
            Some(build())
        } else {
            None
        }
    }
}
