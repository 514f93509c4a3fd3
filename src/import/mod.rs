//! XLIFF 导入流水线
//!
//! 入口为 [`Importer`]：解码文件、推导语言、执行对账。
//!
//! ## 路径选择
//! 两条路径实现同一 [`ImportStrategy`] 契约：加速批量路径与
//! 常规逐条路径。可用性在构造时探测一次（配置开关 + SQLite 能力），
//! 进程生命周期内视为静态，不逐次重探。加速路径失败向调用方上抛，
//! 同一次调用内不静默改走常规路径；批量事务已回滚，调用方可自行
//! 决定降级重试。两条路径对同一输入必须收敛到相同的最终表状态。

pub mod bulk;
pub mod service;

use std::path::Path;

use rusqlite::Connection;
use tracing::{info, warn};

use crate::database::TextDb;
use crate::error::{TextDbError, TextDbResult};
use crate::settings::Settings;
use crate::xliff;

/// 多行 VALUES 语法要求的最低 SQLite 版本（3.7.11）
const MIN_BULK_SQLITE_VERSION: i64 = 3_007_011;

/// 一次文件导入的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// 新插入的条目数
    pub imported: u64,
    /// 更新的条目数
    pub updated: u64,
    /// 逐条错误（条目级失败不打断整个文件）
    pub errors: Vec<String>,
}

impl ImportOutcome {
    /// 合并另一次导入的结果（目录导入聚合用）
    pub fn merge(&mut self, other: ImportOutcome) {
        self.imported += other.imported;
        self.updated += other.updated;
        self.errors.extend(other.errors);
    }
}

/// 导入路径契约
///
/// 两个实现必须对同一输入产生相同的最终表状态与计数。
pub trait ImportStrategy {
    /// 路径名（日志与诊断用）
    fn name(&self) -> &'static str;

    /// 对账一批已解码条目
    fn import(
        &self,
        conn: &Connection,
        settings: &Settings,
        units: &[xliff::TransUnit],
        language_id: i64,
        force: bool,
    ) -> TextDbResult<ImportOutcome>;
}

/// 常规逐条路径
struct ConventionalStrategy;

impl ImportStrategy for ConventionalStrategy {
    fn name(&self) -> &'static str {
        "conventional"
    }

    fn import(
        &self,
        conn: &Connection,
        settings: &Settings,
        units: &[xliff::TransUnit],
        language_id: i64,
        force: bool,
    ) -> TextDbResult<ImportOutcome> {
        service::import_units(conn, settings, units, language_id, force)
    }
}

/// 加速批量路径
struct BulkStrategy;

impl ImportStrategy for BulkStrategy {
    fn name(&self) -> &'static str {
        "bulk"
    }

    fn import(
        &self,
        conn: &Connection,
        settings: &Settings,
        units: &[xliff::TransUnit],
        language_id: i64,
        force: bool,
    ) -> TextDbResult<ImportOutcome> {
        bulk::BulkImporter::import(conn, settings, units, language_id, force)
            .map(bulk::ImportStats::into_outcome)
    }
}

/// 导入编排器
pub struct Importer<'a> {
    db: &'a TextDb,
    settings: &'a Settings,
    /// 构造时选定，进程生命周期内不变
    strategy: Box<dyn ImportStrategy>,
}

impl<'a> Importer<'a> {
    /// 创建编排器并探测一次加速路径可用性
    pub fn new(db: &'a TextDb, settings: &'a Settings) -> Self {
        let version = db.sqlite_version();
        let bulk_capable = settings.accelerated && version >= MIN_BULK_SQLITE_VERSION;

        if settings.accelerated && !bulk_capable {
            warn!(
                "[Import] Accelerated path requested but SQLite {} lacks multi-row VALUES, \
                 using conventional path",
                version
            );
        }

        let strategy: Box<dyn ImportStrategy> = if bulk_capable {
            Box::new(BulkStrategy)
        } else {
            Box::new(ConventionalStrategy)
        };
        info!("[Import] Selected {} import path", strategy.name());

        Self {
            db,
            settings,
            strategy,
        }
    }

    /// 选定路径的名称
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// 导入单个 XLIFF 文件
    ///
    /// 语言从文件名推导（`<lang>.<anything>.xlf`），解码失败是
    /// 文件级致命错误。条目级失败记入 `errors` 不中断导入。
    pub fn import_file(&self, path: &Path, force: bool) -> TextDbResult<ImportOutcome> {
        let units = xliff::decode_file(path)?;
        let language_key = xliff::language_key_from_file(path);
        let language_id = self.settings.language_id(&language_key);

        info!(
            "[Import] Importing {} ({} units, language '{}' -> {})",
            path.display(),
            units.len(),
            language_key,
            language_id
        );

        self.import_units(&units, language_id, force)
    }

    /// 导入已解码的条目集合
    pub fn import_units(
        &self,
        units: &[xliff::TransUnit],
        language_id: i64,
        force: bool,
    ) -> TextDbResult<ImportOutcome> {
        if units.is_empty() {
            return Ok(ImportOutcome::default());
        }

        let conn = self.db.get_conn()?;
        self.strategy
            .import(&conn, self.settings, units, language_id, force)
    }

    /// 导入目录下全部 XLIFF 文件
    ///
    /// 按语言 ID 升序导入：默认语言先行，使非默认条目在插入时
    /// 就能找到父行并建立链接。文件级失败记入结果，不中断遍历。
    pub fn import_directory(&self, dir: &Path, force: bool) -> TextDbResult<ImportOutcome> {
        let mut files: Vec<(i64, std::path::PathBuf)> = Vec::new();

        for entry in std::fs::read_dir(dir).map_err(|e| {
            TextDbError::Io(format!("Failed to read directory {}: {}", dir.display(), e))
        })? {
            let entry = entry.map_err(|e| TextDbError::Io(e.to_string()))?;
            let path = entry.path();

            let is_xliff = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("xlf") || ext.eq_ignore_ascii_case("xliff"))
                .unwrap_or(false);
            if !path.is_file() || !is_xliff {
                continue;
            }

            let language_key = xliff::language_key_from_file(&path);
            files.push((self.settings.language_id(&language_key), path));
        }

        files.sort();

        let mut outcome = ImportOutcome::default();
        for (_, path) in files {
            match self.import_file(&path, force) {
                Ok(file_outcome) => outcome.merge(file_outcome),
                Err(e) => {
                    warn!("[Import] Failed to import {}: {}", path.display(), e);
                    outcome.errors.push(format!("{}: {}", path.display(), e));
                }
            }
        }

        Ok(outcome)
    }
}
