//! 加速批量导入路径
//!
//! 与逐条路径的对账判定完全一致，但把数据库往返压缩为少量批量语句：
//! 维度表全量预载、分块存在性查询、多行 VALUES 插入、CASE/WHEN 批量
//! 更新，全部包在单个 IMMEDIATE 事务里。任何失败整体回滚，
//! 上层据负数错误码降级到常规路径。
//!
//! ## 等价性契约
//! 同一输入在两条路径下必须收敛到相同的最终表状态（计数、值、
//! 父行链接）。父行链接在插入后由补链更新统一建立。

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use crate::database::now_utc;
use crate::error::{TextDbError, TextDbResult};
use crate::import::ImportOutcome;
use crate::key::TranslationKey;
use crate::repos::{IdentityCache, IdentityKind, IdentityRepo};
use crate::settings::Settings;
use crate::xliff::TransUnit;

/// 批量路径错误码
///
/// 负数约定来自加速后端协议：上层只依赖符号判定失败，
/// 具体码值用于日志与诊断。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum BulkErrorCode {
    /// 输入不合法（参数、语言 ID 越界）
    InvalidInput = -1,
    /// 存储/连接层失败
    Storage = -2,
    /// 解析/编码失败
    Parse = -3,
    /// 资源或容量上限
    ResourceLimit = -4,
    /// 内部不变量被破坏
    Internal = -5,
}

impl BulkErrorCode {
    fn error(self, message: impl Into<String>) -> TextDbError {
        TextDbError::Bulk {
            code: self as i32,
            message: message.into(),
        }
    }
}

/// 批量导入统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub total_processed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl ImportStats {
    pub fn into_outcome(self) -> ImportOutcome {
        ImportOutcome {
            imported: self.inserted,
            updated: self.updated,
            errors: self.errors,
        }
    }
}

/// 解析完成、身份已落位的待对账条目
///
/// `values` 按出现顺序保存同一五元组的全部值，
/// 对账时据此重放逐条路径的逐次判定。
struct ResolvedEntry {
    component: i64,
    type_uid: i64,
    placeholder: String,
    values: Vec<String>,
}

/// 批量导入器
pub struct BulkImporter;

impl BulkImporter {
    /// 批量导入一批条目
    ///
    /// 失败返回 `TextDbError::Bulk`，事务已回滚，调用方可安全降级重跑。
    pub fn import(
        conn: &Connection,
        settings: &Settings,
        units: &[TransUnit],
        language_id: i64,
        force: bool,
    ) -> TextDbResult<ImportStats> {
        let started = Instant::now();

        if language_id < -1 {
            return Err(
                BulkErrorCode::InvalidInput.error(format!("invalid language id {}", language_id))
            );
        }

        let mut stats = ImportStats {
            total_processed: units.len() as u64,
            ..ImportStats::default()
        };

        // 键解析在事务外完成，非法键只影响自身条目
        let mut parsed: Vec<(TranslationKey, &TransUnit)> = Vec::with_capacity(units.len());
        for unit in units {
            match TranslationKey::parse(&unit.id) {
                Ok(key) => parsed.push((key, unit)),
                Err(e) => stats.errors.push(format!("{}: {}", unit.id, e)),
            }
        }

        if parsed.is_empty() {
            stats.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(stats);
        }

        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| BulkErrorCode::Storage.error(format!("cannot begin transaction: {}", e)))?;

        match Self::import_in_transaction(conn, settings, parsed, language_id, force, &mut stats) {
            Ok(()) => {
                conn.execute_batch("COMMIT").map_err(|e| {
                    BulkErrorCode::Storage.error(format!("commit failed: {}", e))
                })?;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "[Import::Bulk] Processed {} entries: {} inserted, {} updated, {} skipped ({} ms)",
            stats.total_processed, stats.inserted, stats.updated, stats.skipped, stats.duration_ms
        );
        Ok(stats)
    }

    fn import_in_transaction(
        conn: &Connection,
        settings: &Settings,
        parsed: Vec<(TranslationKey, &TransUnit)>,
        language_id: i64,
        force: bool,
        stats: &mut ImportStats,
    ) -> TextDbResult<()> {
        let pid = settings.pid;
        let storage = |e: TextDbError| BulkErrorCode::Storage.error(e.to_string());

        // 维度表全量预载，之后的解析基本全部命中缓存
        let mut cache = IdentityCache::new();
        for kind in [
            IdentityKind::Environment,
            IdentityKind::Component,
            IdentityKind::Type,
        ] {
            let rows = IdentityRepo::load_all(conn, kind, pid).map_err(storage)?;
            cache.preload(kind, rows);
        }

        let env = IdentityRepo::resolve(
            conn,
            &mut cache,
            IdentityKind::Environment,
            pid,
            &settings.environment,
            true,
        )
        .map_err(storage)?
        .ok_or_else(|| {
            BulkErrorCode::Internal.error(format!(
                "environment '{}' unresolved despite auto-create",
                settings.environment
            ))
        })?;

        // 身份解析 + 按五元组归组，重复出现的值按序保留
        let mut by_tuple: HashMap<(i64, i64, String), ResolvedEntry> = HashMap::new();
        let mut order: Vec<(i64, i64, String)> = Vec::with_capacity(parsed.len());

        for (key, unit) in parsed {
            let comp = IdentityRepo::resolve(
                conn,
                &mut cache,
                IdentityKind::Component,
                pid,
                &key.component,
                true,
            )
            .map_err(storage)?;
            let typ = IdentityRepo::resolve(
                conn,
                &mut cache,
                IdentityKind::Type,
                pid,
                &key.type_name,
                true,
            )
            .map_err(storage)?;

            let (Some(comp), Some(typ)) = (comp, typ) else {
                stats.errors.push(format!("{}: identity unresolved", unit.id));
                continue;
            };

            let tuple = (comp.uid, typ.uid, key.placeholder.clone());
            match by_tuple.entry(tuple.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(ResolvedEntry {
                        component: comp.uid,
                        type_uid: typ.uid,
                        placeholder: key.placeholder,
                        values: vec![unit.value().to_string()],
                    });
                    order.push(tuple);
                }
                Entry::Occupied(mut slot) => {
                    slot.get_mut().values.push(unit.value().to_string());
                }
            }
        }

        // 分块存在性查询：uid 与现值（现值用于占位行判定）
        let mut existing: HashMap<(i64, i64, String), (i64, String)> = HashMap::new();
        let entries: Vec<&ResolvedEntry> = order.iter().map(|t| &by_tuple[t]).collect();

        for chunk in entries.chunks(settings.lookup_batch_size.max(1)) {
            Self::lookup_chunk(conn, env.uid, language_id, chunk, &mut existing)?;
        }

        // 对账分流。同一五元组多次出现时重放逐条路径的判定链：
        // 每次出现都对"当前值"应用占位行/强制规则，计数与最终值
        // 因此和逐条路径完全一致。
        let mut inserts: Vec<(&ResolvedEntry, &str)> = Vec::new();
        let mut updates: Vec<(i64, &str)> = Vec::new();
        let mut written: Vec<&ResolvedEntry> = Vec::new();

        for &entry in &entries {
            let tuple = (entry.component, entry.type_uid, entry.placeholder.clone());
            match existing.get(&tuple) {
                Some((uid, db_value)) => {
                    let mut current = db_value.as_str();
                    let mut writes = 0u64;
                    for value in &entry.values {
                        if force || current == entry.placeholder.as_str() {
                            current = value.as_str();
                            writes += 1;
                        } else {
                            stats.skipped += 1;
                        }
                    }
                    if writes > 0 {
                        updates.push((*uid, current));
                        // 末次写入由批量 UPDATE 计数
                        stats.updated += writes - 1;
                        written.push(entry);
                    }
                }
                None => {
                    let mut occurrences = entry.values.iter();
                    let Some(first) = occurrences.next() else {
                        continue;
                    };
                    let mut current = first.as_str();
                    for value in occurrences {
                        if force || current == entry.placeholder.as_str() {
                            current = value.as_str();
                            stats.updated += 1;
                        } else {
                            stats.skipped += 1;
                        }
                    }
                    inserts.push((entry, current));
                    written.push(entry);
                }
            }
        }

        let now = now_utc();

        for chunk in inserts.chunks(settings.insert_batch_size.max(1)) {
            Self::insert_chunk(conn, pid, env.uid, language_id, chunk, &now)?;
            stats.inserted += chunk.len() as u64;
        }

        for chunk in updates.chunks(settings.insert_batch_size.max(1)) {
            Self::update_chunk(conn, chunk, &now)?;
            stats.updated += chunk.len() as u64;
        }

        // 补链：本次运行写入的非默认语言行链接到同五元组的默认语言
        // 父行。只限本次写入的行，运行外的既有行不动。
        if language_id > 0 && !written.is_empty() {
            for chunk in written.chunks(settings.lookup_batch_size.max(1)) {
                Self::link_parents(conn, env.uid, language_id, chunk, &now)?;
            }
        }

        debug!(
            "[Import::Bulk] Transaction body done: {} inserts, {} updates pending commit",
            stats.inserted, stats.updated
        );
        Ok(())
    }

    /// 分块查询既有行，结果并入 `found`
    fn lookup_chunk(
        conn: &Connection,
        environment: i64,
        language_id: i64,
        chunk: &[&ResolvedEntry],
        found: &mut HashMap<(i64, i64, String), (i64, String)>,
    ) -> TextDbResult<()> {
        let tuple_clause = std::iter::repeat("(component = ? AND type = ? AND placeholder = ?)")
            .take(chunk.len())
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT uid, component, type, placeholder, value FROM translations \
             WHERE environment = ? AND language_id = ? AND ({})",
            tuple_clause
        );

        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(2 + chunk.len() * 3);
        params.push(environment.into());
        params.push(language_id.into());
        for entry in chunk {
            params.push(entry.component.into());
            params.push(entry.type_uid.into());
            params.push(entry.placeholder.clone().into());
        }

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| BulkErrorCode::Storage.error(format!("lookup prepare failed: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok((
                    (
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ),
                    (row.get::<_, i64>(0)?, row.get::<_, String>(4)?),
                ))
            })
            .map_err(|e| BulkErrorCode::Storage.error(format!("lookup failed: {}", e)))?;

        for row in rows {
            let (tuple, hit) =
                row.map_err(|e| BulkErrorCode::Storage.error(format!("lookup row failed: {}", e)))?;
            found.insert(tuple, hit);
        }
        Ok(())
    }

    /// 多行 VALUES 插入一个批次
    fn insert_chunk(
        conn: &Connection,
        pid: i64,
        environment: i64,
        language_id: i64,
        chunk: &[(&ResolvedEntry, &str)],
        now: &str,
    ) -> TextDbResult<()> {
        let values_clause = std::iter::repeat("(?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)")
            .take(chunk.len())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO translations \
             (pid, environment, component, type, placeholder, value, language_id, \
              l10n_parent, hidden, created_at, updated_at) \
             VALUES {}",
            values_clause
        );

        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() * 9);
        for (entry, value) in chunk {
            params.push(pid.into());
            params.push(environment.into());
            params.push(entry.component.into());
            params.push(entry.type_uid.into());
            params.push(entry.placeholder.clone().into());
            params.push(value.to_string().into());
            params.push(language_id.into());
            params.push(now.to_string().into());
            params.push(now.to_string().into());
        }

        conn.execute(&sql, params_from_iter(params))
            .map_err(|e| BulkErrorCode::Storage.error(format!("batch insert failed: {}", e)))?;
        Ok(())
    }

    /// CASE/WHEN 批量更新一个批次
    fn update_chunk(conn: &Connection, chunk: &[(i64, &str)], now: &str) -> TextDbResult<()> {
        let when_clause = std::iter::repeat("WHEN ? THEN ?")
            .take(chunk.len())
            .collect::<Vec<_>>()
            .join(" ");
        let in_clause = std::iter::repeat("?")
            .take(chunk.len())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE translations SET value = CASE uid {} END, updated_at = ? WHERE uid IN ({})",
            when_clause, in_clause
        );

        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() * 3 + 1);
        for (uid, value) in chunk {
            params.push((*uid).into());
            params.push(value.to_string().into());
        }
        params.push(now.to_string().into());
        for (uid, _) in chunk {
            params.push((*uid).into());
        }

        conn.execute(&sql, params_from_iter(params))
            .map_err(|e| BulkErrorCode::Storage.error(format!("batch update failed: {}", e)))?;
        Ok(())
    }

    /// 为本批次写入的行补默认语言父行链接
    fn link_parents(
        conn: &Connection,
        environment: i64,
        language_id: i64,
        chunk: &[&ResolvedEntry],
        now: &str,
    ) -> TextDbResult<()> {
        let tuple_clause = std::iter::repeat("(component = ? AND type = ? AND placeholder = ?)")
            .take(chunk.len())
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "UPDATE translations SET l10n_parent = (
                 SELECT p.uid FROM translations p
                 WHERE p.environment = translations.environment
                   AND p.component = translations.component
                   AND p.type = translations.type
                   AND p.placeholder = translations.placeholder
                   AND p.language_id = 0
             ), updated_at = ?
             WHERE environment = ? AND language_id = ? AND ({})
               AND EXISTS (
                 SELECT 1 FROM translations p
                 WHERE p.environment = translations.environment
                   AND p.component = translations.component
                   AND p.type = translations.type
                   AND p.placeholder = translations.placeholder
                   AND p.language_id = 0
             )",
            tuple_clause
        );

        let mut params: Vec<rusqlite::types::Value> = Vec::with_capacity(3 + chunk.len() * 3);
        params.push(now.to_string().into());
        params.push(environment.into());
        params.push(language_id.into());
        for entry in chunk {
            params.push(entry.component.into());
            params.push(entry.type_uid.into());
            params.push(entry.placeholder.clone().into());
        }

        let linked = conn
            .execute(&sql, params_from_iter(params))
            .map_err(|e| BulkErrorCode::Storage.error(format!("parent linking failed: {}", e)))?;

        if linked > 0 {
            debug!(
                "[Import::Bulk] Linked {} rows to default-language parents",
                linked
            );
        }
        Ok(())
    }
}
