// ==========================================
// 钢结构项目管理 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config_trait::{ConfigResult, EngineConfigReader};
use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::engine::readiness::RfiFailureMode;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// rust_decimal 支持的最大小数位
const MAX_MONEY_SCALE: u32 = 28;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例(自动建表)
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 配置值（UPSERT）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, ?3)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON格式,按键排序）
    ///
    /// # 用途
    /// - 与判定结果一起留存,便于复核当时的参数
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// EngineConfigReader Trait 实现
// ==========================================
// 非法取值一律回落到默认值并记录告警,不阻断引擎
#[async_trait]
impl EngineConfigReader for ConfigManager {
    async fn get_rfi_failure_mode(&self) -> ConfigResult<RfiFailureMode> {
        let value = self.get_config_or_default(config_keys::RFI_FAILURE_MODE, "PER_RFI")?;
        match value.trim().to_uppercase().as_str() {
            "PER_RFI" => Ok(RfiFailureMode::PerRfi),
            "SUMMARY" => Ok(RfiFailureMode::Summary),
            _ => {
                tracing::warn!(
                    config_key = config_keys::RFI_FAILURE_MODE,
                    raw_value = %value,
                    "RFI 上报方式配置非法，使用 PER_RFI"
                );
                Ok(RfiFailureMode::PerRfi)
            }
        }
    }

    async fn get_include_details(&self) -> ConfigResult<bool> {
        let value = self.get_config_or_default(config_keys::INCLUDE_DETAILS, "true")?;
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => {
                tracing::warn!(
                    config_key = config_keys::INCLUDE_DETAILS,
                    raw_value = %value,
                    "明细开关配置非法，使用 true"
                );
                Ok(true)
            }
        }
    }

    async fn get_money_scale(&self) -> ConfigResult<u32> {
        let value = self.get_config_or_default(config_keys::MONEY_SCALE, "2")?;
        match value.trim().parse::<u32>() {
            Ok(scale) if scale <= MAX_MONEY_SCALE => Ok(scale),
            _ => {
                tracing::warn!(
                    config_key = config_keys::MONEY_SCALE,
                    raw_value = %value,
                    "金额小数位配置非法，使用 2"
                );
                Ok(2)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 就绪判定
    pub const RFI_FAILURE_MODE: &str = "readiness.rfi_failure_mode";
    pub const INCLUDE_DETAILS: &str = "readiness.include_details";

    // 计量
    pub const MONEY_SCALE: &str = "billing.money_scale";
}
