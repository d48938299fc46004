// ==========================================
// 钢结构项目管理 - 引擎层存储聚合
// ==========================================
// 职责: 聚合引擎所需的全部协作存储
// 目标: API 层只持有一个结构体,测试时可整体替换为内存实现
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{
    BillingRepository, BillingStore, DrawingRepository, DrawingRfiReader, FabricationRepository,
    FabricationStore, RepositoryError, RepositoryResult,
};

/// 引擎存储集合
///
/// # 包含的存储
/// - `drawings`: 图纸套与 RFI(只读)
/// - `fabrication`: 加工包与构件
/// - `billing`: 计量行与发票行
#[derive(Clone)]
pub struct EngineStores {
    pub drawings: Arc<dyn DrawingRfiReader>,
    pub fabrication: Arc<dyn FabricationStore>,
    pub billing: Arc<dyn BillingStore>,
}

impl EngineStores {
    pub fn new(
        drawings: Arc<dyn DrawingRfiReader>,
        fabrication: Arc<dyn FabricationStore>,
        billing: Arc<dyn BillingStore>,
    ) -> Self {
        Self {
            drawings,
            fabrication,
            billing,
        }
    }

    /// 基于同一 SQLite 连接构建三个仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            drawings: Arc::new(DrawingRepository::from_connection(conn.clone())),
            fabrication: Arc::new(FabricationRepository::from_connection(conn.clone())),
            billing: Arc::new(BillingRepository::from_connection(conn)),
        }
    }

    /// 打开数据库文件(自动建表),返回存储集合与共享连接
    ///
    /// 共享连接可继续交给 ConfigManager::from_connection 使用。
    pub fn open_sqlite(db_path: &str) -> RepositoryResult<(Self, Arc<Mutex<Connection>>)> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));
        Ok((Self::from_connection(conn.clone()), conn))
    }
}
