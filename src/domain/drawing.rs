// ==========================================
// 钢结构项目管理 - 图纸与 RFI 领域模型
// ==========================================
// 职责: 深化设计流程产生的只读快照
// 红线: 引擎只读,不修改图纸/RFI
// ==========================================

use crate::domain::error::DomainError;
use crate::domain::types::{DrawingStatus, RfiStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// DrawingSet - 图纸套
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingSet {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub status: DrawingStatus,
    pub due_date: Option<NaiveDate>,
    pub metadata: Option<DrawingMetadata>, // 边界处解码一次,下游不再解析
}

// ==========================================
// DrawingMetadata - 图纸嵌入元数据 (版本化)
// ==========================================
// 存储端为 JSON 字符串;缺失 version 字段的历史数据按 v1 处理
pub const DRAWING_METADATA_VERSION: u32 = 1;

fn default_metadata_version() -> u32 {
    DRAWING_METADATA_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingMetadata {
    #[serde(default = "default_metadata_version")]
    pub version: u32,
    #[serde(default)]
    pub sheet_count: Option<u32>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub reviewer: Option<String>,
}

impl DrawingMetadata {
    /// 解码存储端的元数据 JSON
    ///
    /// # 返回
    /// - Ok(None): 原始值为空
    /// - Ok(Some(..)): 解码成功
    /// - Err: JSON 非法或版本不支持
    pub fn decode(raw: Option<&str>) -> Result<Option<Self>, DomainError> {
        let raw = match raw.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(None),
        };

        let meta: DrawingMetadata = serde_json::from_str(raw)
            .map_err(|e| DomainError::MalformedMetadata(e.to_string()))?;

        if meta.version != DRAWING_METADATA_VERSION {
            return Err(DomainError::UnsupportedMetadataVersion(meta.version));
        }

        Ok(Some(meta))
    }

    /// 编码为存储端 JSON
    pub fn encode(&self) -> String {
        serde_json::json!({
            "version": self.version,
            "sheet_count": self.sheet_count,
            "revision": self.revision,
            "reviewer": self.reviewer,
        })
        .to_string()
    }
}

// ==========================================
// Rfi - 技术核定单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rfi {
    pub id: String,
    pub project_id: String,
    pub subject: String,
    pub status: RfiStatus,
    pub linked_drawing_set_id: Option<String>,
}

impl Rfi {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}
