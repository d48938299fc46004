// ==========================================
// 钢结构项目管理 - 计量/发票数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑,锁定/范围校验由引擎完成
// 说明: billed_to_date 在读取时按已审批/已付款发票行汇总,不落库
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::billing::{InvoiceLine, SovItem, SovPatch};
use crate::domain::error::DomainError;
use crate::domain::types::InvoiceStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::traits::BillingStore;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

fn parse_amount(field: &str, raw: &str) -> Result<Decimal, DomainError> {
    Decimal::from_str(raw.trim()).map_err(|_| DomainError::InvalidAmount {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

// ==========================================
// BillingRepository - 计量仓储
// ==========================================
pub struct BillingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl BillingRepository {
    /// 创建新的 BillingRepository 实例(自动建表)
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

    /// 写入计量行
    ///
    /// 使用 ON CONFLICT 更新,避免 REPLACE 删除行触发发票行外键。
    /// billed_to_date 为派生值,不写入。
    pub fn upsert_sov_item(&self, item: &SovItem) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO sov_item (
                id, project_id, sov_code, description, category, scheduled_value, percent_complete
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                sov_code = excluded.sov_code,
                description = excluded.description,
                category = excluded.category,
                scheduled_value = excluded.scheduled_value,
                percent_complete = excluded.percent_complete
            "#,
            params![
                item.id,
                item.project_id,
                item.sov_code,
                item.description,
                item.category,
                item.scheduled_value.to_string(),
                item.percent_complete.to_string(),
            ],
        )?;
        Ok(())
    }

    /// 写入发票抬头
    pub fn upsert_invoice(
        &self,
        invoice_id: &str,
        project_id: &str,
        status: InvoiceStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO invoice (id, project_id, status) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET status = excluded.status
            "#,
            params![invoice_id, project_id, status.as_str()],
        )?;
        Ok(())
    }

    /// 写入发票行(发票抬头须已存在)
    pub fn insert_invoice_line(&self, line: &InvoiceLine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO invoice_line (id, invoice_id, sov_item_id, amount)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![line.id, line.invoice_id, line.sov_item_id, line.amount.to_string()],
        )?;
        Ok(())
    }

    fn query_invoice_lines(conn: &Connection, project_id: &str) -> RepositoryResult<Vec<InvoiceLine>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT l.id, l.invoice_id, l.sov_item_id, i.status, l.amount
            FROM invoice_line l
            JOIN invoice i ON i.id = l.invoice_id
            WHERE i.project_id = ?1
            ORDER BY l.invoice_id, l.id
            "#,
        )?;

        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut lines = Vec::with_capacity(rows.len());
        for (id, invoice_id, sov_item_id, status, amount) in rows {
            lines.push(InvoiceLine {
                id,
                invoice_id,
                sov_item_id,
                invoice_status: status.parse::<InvoiceStatus>()?,
                amount: parse_amount("amount", &amount)?,
            });
        }
        Ok(lines)
    }

    fn find_invoice_lines(&self, project_id: &str) -> RepositoryResult<Vec<InvoiceLine>> {
        let conn = self.get_conn()?;
        Self::query_invoice_lines(&conn, project_id)
    }

    fn query_sov_items(&self, project_id: &str) -> RepositoryResult<Vec<SovItem>> {
        let conn = self.get_conn()?;

        // 已开票 = 已审批/已付款发票行金额合计
        let mut billed: HashMap<String, Decimal> = HashMap::new();
        for line in Self::query_invoice_lines(&conn, project_id)? {
            if line.locks_sov_item() {
                *billed.entry(line.sov_item_id.clone()).or_insert(Decimal::ZERO) += line.amount;
            }
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT id, project_id, sov_code, description, category, scheduled_value, percent_complete
            FROM sov_item
            WHERE project_id = ?1
            ORDER BY sov_code, id
            "#,
        )?;

        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for (id, project_id, sov_code, description, category, scheduled, pct) in rows {
            let billed_to_date = billed.get(&id).copied().unwrap_or(Decimal::ZERO);
            items.push(SovItem {
                id,
                project_id,
                sov_code,
                description,
                category,
                scheduled_value: parse_amount("scheduled_value", &scheduled)?,
                percent_complete: parse_amount("percent_complete", &pct)?,
                billed_to_date,
            });
        }
        Ok(items)
    }

    fn apply_sov_patch(&self, sov_item_id: &str, patch: &SovPatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let exists: bool = tx
            .query_row(
                "SELECT 1 FROM sov_item WHERE id = ?1",
                params![sov_item_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(RepositoryError::not_found("SovItem", sov_item_id));
        }

        if let Some(value) = patch.scheduled_value {
            tx.execute(
                "UPDATE sov_item SET scheduled_value = ?1 WHERE id = ?2",
                params![value.to_string(), sov_item_id],
            )?;
        }
        if let Some(pct) = patch.percent_complete {
            tx.execute(
                "UPDATE sov_item SET percent_complete = ?1 WHERE id = ?2",
                params![pct.to_string(), sov_item_id],
            )?;
        }
        if let Some(desc) = &patch.description {
            tx.execute(
                "UPDATE sov_item SET description = ?1 WHERE id = ?2",
                params![desc, sov_item_id],
            )?;
        }
        if let Some(cat) = &patch.category {
            tx.execute(
                "UPDATE sov_item SET category = ?1 WHERE id = ?2",
                params![cat, sov_item_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl BillingStore for BillingRepository {
    async fn list_sov_items(&self, project_id: &str) -> RepositoryResult<Vec<SovItem>> {
        self.query_sov_items(project_id)
    }

    async fn list_invoice_lines(&self, project_id: &str) -> RepositoryResult<Vec<InvoiceLine>> {
        self.find_invoice_lines(project_id)
    }

    async fn update_sov_item(&self, sov_item_id: &str, patch: &SovPatch) -> RepositoryResult<()> {
        self.apply_sov_patch(sov_item_id, patch)
    }
}
