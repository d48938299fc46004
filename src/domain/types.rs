// ==========================================
// 钢结构项目管理 - 领域状态类型
// ==========================================
// 职责: 图纸/RFI/加工包/构件/发票状态枚举
// 序列化: 与协作存储的字段拼写保持一致
// ==========================================

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 图纸状态 (Drawing Status)
// ==========================================
// 顺序: IFA < BFA < BFS < FFF < As-Built
// 红线: 只允许前进,回退需显式作废(不在引擎范围)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DrawingStatus {
    #[serde(rename = "IFA")]
    Ifa, // 送审 (Issued for Approval)
    #[serde(rename = "BFA")]
    Bfa, // 退回待审 (Back from Approval)
    #[serde(rename = "BFS")]
    Bfs, // 退回待改 (Back for Submittal)
    #[serde(rename = "FFF")]
    Fff, // 可加工 (Fit for Fabrication)
    #[serde(rename = "As-Built")]
    AsBuilt, // 竣工
}

impl DrawingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawingStatus::Ifa => "IFA",
            DrawingStatus::Bfa => "BFA",
            DrawingStatus::Bfs => "BFS",
            DrawingStatus::Fff => "FFF",
            DrawingStatus::AsBuilt => "As-Built",
        }
    }

    /// 是否可以推进到目标状态
    ///
    /// 同状态视为无操作,允许;任何回退都不允许。
    pub fn can_advance_to(&self, next: DrawingStatus) -> bool {
        next >= *self
    }

    /// 是否满足加工放行条件 (严格等于 FFF)
    pub fn is_fabrication_ready(&self) -> bool {
        matches!(self, DrawingStatus::Fff)
    }
}

impl fmt::Display for DrawingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "IFA" => Ok(DrawingStatus::Ifa),
            "BFA" => Ok(DrawingStatus::Bfa),
            "BFS" => Ok(DrawingStatus::Bfs),
            "FFF" => Ok(DrawingStatus::Fff),
            "As-Built" => Ok(DrawingStatus::AsBuilt),
            other => Err(DomainError::unknown_status("DrawingStatus", other)),
        }
    }
}

// ==========================================
// RFI 状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfiStatus {
    Draft,
    Submitted,
    Pending,
    Answered,
    Closed,
}

impl RfiStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RfiStatus::Draft => "draft",
            RfiStatus::Submitted => "submitted",
            RfiStatus::Pending => "pending",
            RfiStatus::Answered => "answered",
            RfiStatus::Closed => "closed",
        }
    }

    /// 未关闭的 RFI 会阻断放行
    pub fn is_open(&self) -> bool {
        !matches!(self, RfiStatus::Answered | RfiStatus::Closed)
    }
}

impl fmt::Display for RfiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RfiStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "draft" => Ok(RfiStatus::Draft),
            "submitted" => Ok(RfiStatus::Submitted),
            "pending" => Ok(RfiStatus::Pending),
            "answered" => Ok(RfiStatus::Answered),
            "closed" => Ok(RfiStatus::Closed),
            other => Err(DomainError::unknown_status("RfiStatus", other)),
        }
    }
}

// ==========================================
// 加工包状态 (Fabrication Package Status)
// ==========================================
// 顺序即工作流位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Draft,          // 草稿
    PendingPrereqs, // 等待前置条件
    Released,       // 已放行
    InProgress,     // 加工中
    Qc,             // 质检
    Complete,       // 完工
    Shipped,        // 已发运
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Draft => "draft",
            PackageStatus::PendingPrereqs => "pending_prereqs",
            PackageStatus::Released => "released",
            PackageStatus::InProgress => "in_progress",
            PackageStatus::Qc => "qc",
            PackageStatus::Complete => "complete",
            PackageStatus::Shipped => "shipped",
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "draft" => Ok(PackageStatus::Draft),
            "pending_prereqs" => Ok(PackageStatus::PendingPrereqs),
            "released" => Ok(PackageStatus::Released),
            "in_progress" => Ok(PackageStatus::InProgress),
            "qc" => Ok(PackageStatus::Qc),
            "complete" => Ok(PackageStatus::Complete),
            "shipped" => Ok(PackageStatus::Shipped),
            other => Err(DomainError::unknown_status("PackageStatus", other)),
        }
    }
}

// ==========================================
// 构件状态 (Piece Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceStatus {
    NotStarted,  // 未开始
    Released,    // 已放行
    InFab,       // 下料加工
    FitUp,       // 组对
    Weld,        // 焊接
    QcHold,      // 质检暂扣
    Coating,     // 涂装
    ReadyToShip, // 待发运
    Shipped,     // 已发运
}

impl PieceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PieceStatus::NotStarted => "not_started",
            PieceStatus::Released => "released",
            PieceStatus::InFab => "in_fab",
            PieceStatus::FitUp => "fit_up",
            PieceStatus::Weld => "weld",
            PieceStatus::QcHold => "qc_hold",
            PieceStatus::Coating => "coating",
            PieceStatus::ReadyToShip => "ready_to_ship",
            PieceStatus::Shipped => "shipped",
        }
    }

    /// 完工口径: ready_to_ship 或 shipped
    pub fn is_complete(&self) -> bool {
        matches!(self, PieceStatus::ReadyToShip | PieceStatus::Shipped)
    }
}

impl fmt::Display for PieceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PieceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "not_started" => Ok(PieceStatus::NotStarted),
            "released" => Ok(PieceStatus::Released),
            "in_fab" => Ok(PieceStatus::InFab),
            "fit_up" => Ok(PieceStatus::FitUp),
            "weld" => Ok(PieceStatus::Weld),
            "qc_hold" => Ok(PieceStatus::QcHold),
            "coating" => Ok(PieceStatus::Coating),
            "ready_to_ship" => Ok(PieceStatus::ReadyToShip),
            "shipped" => Ok(PieceStatus::Shipped),
            other => Err(DomainError::unknown_status("PieceStatus", other)),
        }
    }
}

// ==========================================
// 发票状态 (Invoice Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Submitted,
    Approved,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Void => "void",
        }
    }

    /// 已审批/已付款的发票会锁定其引用的计量行
    pub fn is_locking(&self) -> bool {
        matches!(self, InvoiceStatus::Approved | InvoiceStatus::Paid)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "draft" => Ok(InvoiceStatus::Draft),
            "submitted" => Ok(InvoiceStatus::Submitted),
            "approved" => Ok(InvoiceStatus::Approved),
            "paid" => Ok(InvoiceStatus::Paid),
            "void" => Ok(InvoiceStatus::Void),
            other => Err(DomainError::unknown_status("InvoiceStatus", other)),
        }
    }
}
