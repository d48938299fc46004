// ==========================================
// 集成测试辅助模块
// ==========================================
#![allow(dead_code)]

pub mod memory_stores;
pub mod mock_config;
pub mod test_data_builder;
