// ==========================================
// 钢结构项目管理 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 自带存储实现的建表脚本
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建表脚本(幂等)
///
/// 说明：
/// - 加工包与图纸的关联不加外键,允许引用尚未同步的图纸(由就绪判定报告缺失)
/// - 金额与百分比以 TEXT 存储,避免浮点误差
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT,
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS drawing_set (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    title TEXT NOT NULL,
    status TEXT NOT NULL,
    due_date TEXT,
    metadata_json TEXT
);

CREATE TABLE IF NOT EXISTS rfi (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    subject TEXT NOT NULL,
    status TEXT NOT NULL,
    linked_drawing_set_id TEXT
);

CREATE TABLE IF NOT EXISTS fabrication_package (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    work_package_id TEXT,
    package_number TEXT NOT NULL,
    status TEXT NOT NULL,
    bom_verified INTEGER NOT NULL DEFAULT 0,
    linked_delivery_id TEXT,
    total_pieces INTEGER NOT NULL DEFAULT 0,
    pieces_complete INTEGER NOT NULL DEFAULT 0,
    total_weight_tons REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS fabrication_package_drawing (
    package_id TEXT NOT NULL REFERENCES fabrication_package(id) ON DELETE CASCADE,
    drawing_set_id TEXT NOT NULL,
    PRIMARY KEY (package_id, drawing_set_id)
);

CREATE TABLE IF NOT EXISTS fabrication_item (
    id TEXT PRIMARY KEY,
    package_id TEXT NOT NULL REFERENCES fabrication_package(id) ON DELETE CASCADE,
    piece_mark TEXT NOT NULL,
    status TEXT NOT NULL,
    material_status TEXT,
    on_hold INTEGER NOT NULL DEFAULT 0,
    weight_tons REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sov_item (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    sov_code TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT,
    scheduled_value TEXT NOT NULL,
    percent_complete TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoice (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invoice_line (
    id TEXT PRIMARY KEY,
    invoice_id TEXT NOT NULL REFERENCES invoice(id) ON DELETE CASCADE,
    sov_item_id TEXT NOT NULL REFERENCES sov_item(id),
    amount TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fabrication_item_package ON fabrication_item(package_id);
CREATE INDEX IF NOT EXISTS idx_invoice_line_sov ON invoice_line(sov_item_id);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表并写入 schema_version(幂等)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

/// 读取 schema_version（若表不存在或为空则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
