// ==========================================
// 钢结构项目管理 - 加工包/构件数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑,状态校验由引擎完成
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::fabrication::{FabricationItem, FabricationPackage, PackagePatch, PiecePatch};
use crate::domain::types::{PackageStatus, PieceStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::traits::FabricationStore;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

const PACKAGE_COLUMNS: &str = r#"
    id, project_id, work_package_id, package_number, status,
    bom_verified, linked_delivery_id, total_pieces, pieces_complete, total_weight_tons
"#;

const PIECE_COLUMNS: &str = r#"
    id, package_id, piece_mark, status, material_status, on_hold, weight_tons
"#;

/// 加工包行(状态未解析)
struct PackageRow {
    id: String,
    project_id: String,
    work_package_id: Option<String>,
    package_number: String,
    status: String,
    bom_verified: bool,
    linked_delivery_id: Option<String>,
    total_pieces: u32,
    pieces_complete: u32,
    total_weight_tons: f64,
}

impl PackageRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            work_package_id: row.get(2)?,
            package_number: row.get(3)?,
            status: row.get(4)?,
            bom_verified: row.get::<_, i64>(5)? != 0,
            linked_delivery_id: row.get(6)?,
            total_pieces: row.get(7)?,
            pieces_complete: row.get(8)?,
            total_weight_tons: row.get(9)?,
        })
    }

    fn into_package(self, drawing_set_ids: BTreeSet<String>) -> RepositoryResult<FabricationPackage> {
        Ok(FabricationPackage {
            id: self.id,
            project_id: self.project_id,
            work_package_id: self.work_package_id,
            package_number: self.package_number,
            status: self.status.parse::<PackageStatus>()?,
            drawing_set_ids,
            bom_verified: self.bom_verified,
            linked_delivery_id: self.linked_delivery_id,
            total_pieces: self.total_pieces,
            pieces_complete: self.pieces_complete,
            total_weight_tons: self.total_weight_tons,
        })
    }
}

fn map_piece(row: &rusqlite::Row<'_>) -> rusqlite::Result<(FabricationItem, String)> {
    let status: String = row.get(3)?;
    Ok((
        FabricationItem {
            id: row.get(0)?,
            package_id: row.get(1)?,
            piece_mark: row.get(2)?,
            status: PieceStatus::NotStarted, // 占位,由调用方解析 status 后覆盖
            material_status: row.get(4)?,
            on_hold: row.get::<_, i64>(5)? != 0,
            weight_tons: row.get(6)?,
        },
        status,
    ))
}

// ==========================================
// FabricationRepository - 加工包/构件仓储
// ==========================================
pub struct FabricationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FabricationRepository {
    /// 创建新的 FabricationRepository 实例(自动建表)
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

    /// 写入加工包及其图纸关联(事务)
    pub fn upsert_package(&self, package: &FabricationPackage) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO fabrication_package (
                id, project_id, work_package_id, package_number, status,
                bom_verified, linked_delivery_id, total_pieces, pieces_complete, total_weight_tons
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                work_package_id = excluded.work_package_id,
                package_number = excluded.package_number,
                status = excluded.status,
                bom_verified = excluded.bom_verified,
                linked_delivery_id = excluded.linked_delivery_id,
                total_pieces = excluded.total_pieces,
                pieces_complete = excluded.pieces_complete,
                total_weight_tons = excluded.total_weight_tons
            "#,
            params![
                package.id,
                package.project_id,
                package.work_package_id,
                package.package_number,
                package.status.as_str(),
                package.bom_verified as i64,
                package.linked_delivery_id,
                package.total_pieces,
                package.pieces_complete,
                package.total_weight_tons,
            ],
        )?;

        tx.execute(
            "DELETE FROM fabrication_package_drawing WHERE package_id = ?1",
            params![package.id],
        )?;
        for drawing_id in &package.drawing_set_ids {
            tx.execute(
                "INSERT INTO fabrication_package_drawing (package_id, drawing_set_id) VALUES (?1, ?2)",
                params![package.id, drawing_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// 写入构件(INSERT OR REPLACE)
    pub fn upsert_piece(&self, piece: &FabricationItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO fabrication_item (
                id, package_id, piece_mark, status, material_status, on_hold, weight_tons
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                piece.id,
                piece.package_id,
                piece.piece_mark,
                piece.status.as_str(),
                piece.material_status,
                piece.on_hold as i64,
                piece.weight_tons,
            ],
        )?;
        Ok(())
    }

    fn load_drawing_ids(conn: &Connection, package_id: &str) -> RepositoryResult<BTreeSet<String>> {
        let mut stmt = conn.prepare(
            "SELECT drawing_set_id FROM fabrication_package_drawing WHERE package_id = ?1",
        )?;
        let ids = stmt
            .query_map(params![package_id], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids)
    }

    fn find_package(&self, package_id: &str) -> RepositoryResult<Option<FabricationPackage>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM fabrication_package WHERE id = ?1", PACKAGE_COLUMNS);
        let row = conn
            .query_row(&sql, params![package_id], PackageRow::from_row)
            .optional()?;

        match row {
            Some(row) => {
                let drawing_ids = Self::load_drawing_ids(&conn, package_id)?;
                Ok(Some(row.into_package(drawing_ids)?))
            }
            None => Ok(None),
        }
    }

    fn find_packages_by_project(&self, project_id: &str) -> RepositoryResult<Vec<FabricationPackage>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM fabrication_package WHERE project_id = ?1 ORDER BY package_number, id",
            PACKAGE_COLUMNS
        );
        let rows = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![project_id], PackageRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut packages = Vec::with_capacity(rows.len());
        for row in rows {
            let drawing_ids = Self::load_drawing_ids(&conn, &row.id)?;
            packages.push(row.into_package(drawing_ids)?);
        }
        Ok(packages)
    }

    fn find_pieces_by_package(&self, package_id: &str) -> RepositoryResult<Vec<FabricationItem>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM fabrication_item WHERE package_id = ?1 ORDER BY piece_mark, id",
            PIECE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![package_id], map_piece)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut piece, status)| -> RepositoryResult<FabricationItem> {
                piece.status = status.parse::<PieceStatus>()?;
                Ok(piece)
            })
            .collect()
    }

    fn find_piece(&self, piece_id: &str) -> RepositoryResult<Option<FabricationItem>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM fabrication_item WHERE id = ?1", PIECE_COLUMNS);
        let row = conn.query_row(&sql, params![piece_id], map_piece).optional()?;

        match row {
            Some((mut piece, status)) => {
                piece.status = status.parse::<PieceStatus>()?;
                Ok(Some(piece))
            }
            None => Ok(None),
        }
    }

    fn apply_package_patch(&self, package_id: &str, patch: &PackagePatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM fabrication_package WHERE id = ?1",
                params![package_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(RepositoryError::not_found("FabricationPackage", package_id));
        }

        if let Some(status) = patch.status {
            tx.execute(
                "UPDATE fabrication_package SET status = ?1 WHERE id = ?2",
                params![status.as_str(), package_id],
            )?;
        }
        if let Some(bom) = patch.bom_verified {
            tx.execute(
                "UPDATE fabrication_package SET bom_verified = ?1 WHERE id = ?2",
                params![bom as i64, package_id],
            )?;
        }
        if let Some(delivery) = &patch.linked_delivery_id {
            tx.execute(
                "UPDATE fabrication_package SET linked_delivery_id = ?1 WHERE id = ?2",
                params![delivery, package_id],
            )?;
        }
        if let Some(complete) = patch.pieces_complete {
            tx.execute(
                "UPDATE fabrication_package SET pieces_complete = ?1 WHERE id = ?2",
                params![complete, package_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn apply_piece_patch(&self, piece_id: &str, patch: &PiecePatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM fabrication_item WHERE id = ?1",
                params![piece_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(RepositoryError::not_found("FabricationItem", piece_id));
        }

        if let Some(status) = patch.status {
            tx.execute(
                "UPDATE fabrication_item SET status = ?1 WHERE id = ?2",
                params![status.as_str(), piece_id],
            )?;
        }
        if let Some(on_hold) = patch.on_hold {
            tx.execute(
                "UPDATE fabrication_item SET on_hold = ?1 WHERE id = ?2",
                params![on_hold as i64, piece_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl FabricationStore for FabricationRepository {
    async fn get_package(&self, package_id: &str) -> RepositoryResult<Option<FabricationPackage>> {
        self.find_package(package_id)
    }

    async fn list_packages(&self, project_id: &str) -> RepositoryResult<Vec<FabricationPackage>> {
        self.find_packages_by_project(project_id)
    }

    async fn list_pieces(&self, package_id: &str) -> RepositoryResult<Vec<FabricationItem>> {
        self.find_pieces_by_package(package_id)
    }

    async fn get_piece(&self, piece_id: &str) -> RepositoryResult<Option<FabricationItem>> {
        self.find_piece(piece_id)
    }

    async fn update_package(&self, package_id: &str, patch: &PackagePatch) -> RepositoryResult<()> {
        self.apply_package_patch(package_id, patch)
    }

    async fn update_piece(&self, piece_id: &str, patch: &PiecePatch) -> RepositoryResult<()> {
        self.apply_piece_patch(piece_id, patch)
    }
}
