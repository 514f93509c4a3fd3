//! TextDB 数据库管理模块
//!
//! 提供翻译库的 SQLite 数据库初始化和管理功能。
//! 使用 r2d2 连接池，WAL 模式。
//!
//! ## 设计原则
//! - **单一数据库**：一个 `textdb.db` 保存全部维度表与翻译表
//! - **连接池管理**：使用 r2d2 管理连接池
//! - **单写者模型**：导入流水线串行写入，池只为读路径与测试便利

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info};

use crate::error::{TextDbError, TextDbResult};

/// 当前 Schema 版本
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// SQLite 连接池类型
pub type TextDbPool = Pool<SqliteConnectionManager>;

/// SQLite 池化连接类型
pub type TextDbPooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// TextDB 数据库管理器
pub struct TextDb {
    /// 数据库连接池
    pool: TextDbPool,
    /// 数据库文件路径（内存库为 None）
    db_path: Option<PathBuf>,
}

impl TextDb {
    /// 创建新的数据库管理器并初始化 Schema
    ///
    /// # Errors
    /// * 目录创建失败
    /// * 连接池创建失败
    /// * Schema 初始化失败
    pub fn new(db_path: &Path) -> TextDbResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    TextDbError::Io(format!(
                        "Failed to create database directory {:?}: {}",
                        parent, e
                    ))
                })?;
            }
        }

        let pool = Self::build_pool(db_path)?;

        let db = Self {
            pool,
            db_path: Some(db_path.to_path_buf()),
        };
        db.initialize_schema()?;

        info!("[TextDb] Database initialized: {}", db_path.display());
        Ok(db)
    }

    /// 创建内存数据库（测试使用）
    ///
    /// 池大小固定为 1，保证所有连接看到同一个内存库。
    pub fn new_in_memory() -> TextDbResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(Self::init_connection);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| TextDbError::Pool(format!("Failed to create in-memory pool: {}", e)))?;

        let db = Self {
            pool,
            db_path: None,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    fn init_connection(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        // 启用外键约束（必须！）
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // 同步模式设为 NORMAL（平衡安全与性能）
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // 设置 busy_timeout 避免无界等待
        conn.pragma_update(None, "busy_timeout", 5000i64)?;
        Ok(())
    }

    /// 构建连接池
    fn build_pool(db_path: &Path) -> TextDbResult<TextDbPool> {
        debug!(
            "[TextDb] Building connection pool for: {}",
            db_path.display()
        );

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            // WAL 模式仅对文件库有意义
            conn.pragma_update(None, "journal_mode", "WAL")?;
            Self::init_connection(conn)
        });

        let pool = Pool::builder()
            .max_size(8) // SQLite 单写者模型下无需太多连接
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .map_err(|e| TextDbError::Pool(format!("Failed to create connection pool: {}", e)))?;

        Ok(pool)
    }

    /// 获取数据库连接
    pub fn get_conn(&self) -> TextDbResult<TextDbPooledConnection> {
        self.pool
            .get()
            .map_err(|e| TextDbError::Pool(format!("Failed to get connection: {}", e)))
    }

    /// 当前数据库文件路径（内存库为 None）
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// SQLite 引擎版本号（如 3045001 = 3.45.1）
    ///
    /// 加速路径的能力探测使用：多行 VALUES 需要 3.7.11+。
    pub fn sqlite_version(&self) -> i64 {
        i64::from(rusqlite::version_number())
    }

    /// 初始化数据库 Schema
    ///
    /// 维度表（environments/components/types）、翻译表与导入任务表。
    /// 五元组唯一约束是整个对账算法的正确性基础。
    fn initialize_schema(&self) -> TextDbResult<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(
            r#"BEGIN;
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY NOT NULL
            );
            CREATE TABLE IF NOT EXISTS environments (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                pid INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (pid, name)
            );
            CREATE TABLE IF NOT EXISTS components (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                pid INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (pid, name)
            );
            CREATE TABLE IF NOT EXISTS types (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                pid INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (pid, name)
            );
            CREATE TABLE IF NOT EXISTS translations (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                pid INTEGER NOT NULL DEFAULT 0,
                environment INTEGER NOT NULL REFERENCES environments(uid),
                component INTEGER NOT NULL REFERENCES components(uid),
                type INTEGER NOT NULL REFERENCES types(uid),
                placeholder TEXT NOT NULL,
                value TEXT NOT NULL,
                language_id INTEGER NOT NULL DEFAULT 0,
                l10n_parent INTEGER NOT NULL DEFAULT 0,
                hidden INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (environment, component, type, placeholder, language_id)
            );
            CREATE INDEX IF NOT EXISTS idx_translations_parent
                ON translations (l10n_parent);
            CREATE INDEX IF NOT EXISTS idx_translations_placeholder
                ON translations (placeholder);
            CREATE TABLE IF NOT EXISTS import_jobs (
                job_id TEXT PRIMARY KEY,
                file_path TEXT NOT NULL,
                original_filename TEXT,
                file_size INTEGER NOT NULL DEFAULT 0,
                force_update INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                imported INTEGER NOT NULL DEFAULT 0,
                updated INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_import_jobs_status
                ON import_jobs (status, created_at);
            COMMIT;"#,
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;

        Ok(())
    }
}

/// 当前 UTC 时间戳（统一格式）
pub fn now_utc() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
