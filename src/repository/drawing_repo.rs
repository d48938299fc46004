// ==========================================
// 钢结构项目管理 - 图纸/RFI 数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::drawing::{DrawingMetadata, DrawingSet, Rfi};
use crate::domain::types::{DrawingStatus, RfiStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::traits::DrawingRfiReader;
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// DrawingRepository - 图纸/RFI 仓储
// ==========================================
/// 职责: 管理 drawing_set / rfi 表
/// 说明: 图纸元数据在读取时解码一次
pub struct DrawingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DrawingRepository {
    /// 创建新的 DrawingRepository 实例(自动建表)
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入图纸套(INSERT OR REPLACE)
    pub fn upsert_drawing_set(&self, drawing: &DrawingSet) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO drawing_set (
                id, project_id, title, status, due_date, metadata_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                drawing.id,
                drawing.project_id,
                drawing.title,
                drawing.status.as_str(),
                drawing.due_date.map(|d| d.to_string()),
                drawing.metadata.as_ref().map(|m| m.encode()),
            ],
        )?;
        Ok(())
    }

    /// 写入 RFI(INSERT OR REPLACE)
    pub fn upsert_rfi(&self, rfi: &Rfi) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO rfi (
                id, project_id, subject, status, linked_drawing_set_id
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                rfi.id,
                rfi.project_id,
                rfi.subject,
                rfi.status.as_str(),
                rfi.linked_drawing_set_id,
            ],
        )?;
        Ok(())
    }

    fn query_drawing_sets(&self, project_id: &str) -> RepositoryResult<Vec<DrawingSet>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, project_id, title, status, due_date, metadata_json
            FROM drawing_set
            WHERE project_id = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map(params![project_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut drawings = Vec::new();
        for row in rows {
            let (id, project_id, title, status, due_date, metadata_json) = row?;
            let due_date = match due_date {
                Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
                    RepositoryError::FieldValueError {
                        field: "due_date".to_string(),
                        message: e.to_string(),
                    }
                })?),
                None => None,
            };
            drawings.push(DrawingSet {
                id,
                project_id,
                title,
                status: status.parse::<DrawingStatus>()?,
                due_date,
                metadata: DrawingMetadata::decode(metadata_json.as_deref())?,
            });
        }

        Ok(drawings)
    }

    fn query_rfis(&self, project_id: &str) -> RepositoryResult<Vec<Rfi>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, project_id, subject, status, linked_drawing_set_id
            FROM rfi
            WHERE project_id = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map(params![project_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut rfis = Vec::new();
        for row in rows {
            let (id, project_id, subject, status, linked_drawing_set_id) = row?;
            rfis.push(Rfi {
                id,
                project_id,
                subject,
                status: status.parse::<RfiStatus>()?,
                linked_drawing_set_id,
            });
        }

        Ok(rfis)
    }
}

#[async_trait]
impl DrawingRfiReader for DrawingRepository {
    async fn list_drawing_sets(&self, project_id: &str) -> RepositoryResult<Vec<DrawingSet>> {
        self.query_drawing_sets(project_id)
    }

    async fn list_rfis(&self, project_id: &str) -> RepositoryResult<Vec<Rfi>> {
        self.query_rfis(project_id)
    }
}
