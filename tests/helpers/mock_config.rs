// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use steel_pm_engine::config::{ConfigResult, EngineConfigReader};
use steel_pm_engine::engine::RfiFailureMode;

/// Mock 配置结构
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub rfi_failure_mode: RfiFailureMode,
    pub include_details: bool,
    pub money_scale: u32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            rfi_failure_mode: RfiFailureMode::PerRfi,
            include_details: true,
            money_scale: 2,
        }
    }
}

impl MockConfig {
    /// 汇总上报 RFI 阻断
    pub fn summary_rfis() -> Self {
        Self {
            rfi_failure_mode: RfiFailureMode::Summary,
            ..Self::default()
        }
    }
}

#[async_trait]
impl EngineConfigReader for MockConfig {
    async fn get_rfi_failure_mode(&self) -> ConfigResult<RfiFailureMode> {
        Ok(self.rfi_failure_mode)
    }

    async fn get_include_details(&self) -> ConfigResult<bool> {
        Ok(self.include_details)
    }

    async fn get_money_scale(&self) -> ConfigResult<u32> {
        Ok(self.money_scale)
    }
}
