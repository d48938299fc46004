// ==========================================
// 钢结构项目管理 - 引擎配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::engine::billing_ledger::LedgerOptions;
use crate::engine::readiness::{ReadinessOptions, RfiFailureMode};
use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// EngineConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait EngineConfigReader: Send + Sync {
    // ===== 就绪判定配置 =====

    /// 获取未关闭 RFI 的上报方式
    ///
    /// # 默认值
    /// - PER_RFI
    async fn get_rfi_failure_mode(&self) -> ConfigResult<RfiFailureMode>;

    /// 阻断项是否附带结构化明细
    ///
    /// # 默认值
    /// - true
    async fn get_include_details(&self) -> ConfigResult<bool>;

    // ===== 计量配置 =====

    /// 获取金额展示小数位
    ///
    /// # 默认值
    /// - 2
    async fn get_money_scale(&self) -> ConfigResult<u32>;

    // ===== 组装 =====

    async fn readiness_options(&self) -> ConfigResult<ReadinessOptions> {
        Ok(ReadinessOptions {
            rfi_failure_mode: self.get_rfi_failure_mode().await?,
            include_details: self.get_include_details().await?,
        })
    }

    async fn ledger_options(&self) -> ConfigResult<LedgerOptions> {
        Ok(LedgerOptions {
            money_scale: self.get_money_scale().await?,
        })
    }
}
