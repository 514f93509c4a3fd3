//! 维度表身份解析
//!
//! Environment / Component / Type 三张维度表结构完全一致，
//! 统一由 `IdentityRepo` 按 `IdentityKind` 操作。
//!
//! ## 缓存模型
//! 缓存由一次导入运行持有（`IdentityCache`），随运行结束丢弃。
//! 不使用进程级静态缓存——跨运行的陈旧读取风险大于复用收益。
//! 缓存运行中从不失效：重命名/删除身份的并发场景不在支持范围内
//! （单写者假设）。

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::database::now_utc;
use crate::error::TextDbResult;

/// 维度表种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    Environment,
    Component,
    Type,
}

impl IdentityKind {
    /// 对应的表名
    pub fn table(self) -> &'static str {
        match self {
            IdentityKind::Environment => "environments",
            IdentityKind::Component => "components",
            IdentityKind::Type => "types",
        }
    }

    /// 展示名（错误信息用）
    pub fn label(self) -> &'static str {
        match self {
            IdentityKind::Environment => "Environment",
            IdentityKind::Component => "Component",
            IdentityKind::Type => "Type",
        }
    }
}

/// 一行维度记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRow {
    pub uid: i64,
    pub name: String,
}

/// 运行级身份缓存
///
/// 同一批导入中相同的 component/type 名称重复出现成千上万次，
/// 命中缓存直接返回是吞吐量的关键。
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: HashMap<(IdentityKind, String), IdentityRow>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, kind: IdentityKind, name: &str) -> Option<&IdentityRow> {
        self.entries.get(&(kind, name.to_string()))
    }

    fn put(&mut self, kind: IdentityKind, row: IdentityRow) -> IdentityRow {
        self.entries.insert((kind, row.name.clone()), row.clone());
        row
    }

    /// 批量预载（加速路径启动时使用）
    pub fn preload(&mut self, kind: IdentityKind, rows: Vec<IdentityRow>) {
        for row in rows {
            self.entries.insert((kind, row.name.clone()), row);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// 维度表仓储
pub struct IdentityRepo;

impl IdentityRepo {
    /// 解析名称到维度行
    ///
    /// 查询顺序：缓存 → 数据库 → （可选）立即创建。
    /// 创建路径不做批处理——不同名称数量很少，不在性能关键路径上。
    /// `create_if_missing` 为 false 且不存在时返回 `None`，
    /// 调用方必须将其视为该条目的致命条件，而非重试。
    pub fn resolve(
        conn: &Connection,
        cache: &mut IdentityCache,
        kind: IdentityKind,
        pid: i64,
        name: &str,
        create_if_missing: bool,
    ) -> TextDbResult<Option<IdentityRow>> {
        if let Some(row) = cache.get(kind, name) {
            return Ok(Some(row.clone()));
        }

        if let Some(row) = Self::find_by_name(conn, kind, pid, name)? {
            return Ok(Some(cache.put(kind, row)));
        }

        if !create_if_missing {
            return Ok(None);
        }

        let row = Self::create(conn, kind, pid, name)?;
        Ok(Some(cache.put(kind, row)))
    }

    /// 按名称查询（范围限定到 pid）
    pub fn find_by_name(
        conn: &Connection,
        kind: IdentityKind,
        pid: i64,
        name: &str,
    ) -> TextDbResult<Option<IdentityRow>> {
        let sql = format!(
            "SELECT uid, name FROM {} WHERE pid = ?1 AND name = ?2",
            kind.table()
        );

        let row = conn
            .query_row(&sql, params![pid, name], |row| {
                Ok(IdentityRow {
                    uid: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .optional()?;

        Ok(row)
    }

    /// 创建维度行并立即持久化
    pub fn create(
        conn: &Connection,
        kind: IdentityKind,
        pid: i64,
        name: &str,
    ) -> TextDbResult<IdentityRow> {
        let sql = format!(
            "INSERT INTO {} (pid, name, created_at) VALUES (?1, ?2, ?3)",
            kind.table()
        );
        conn.execute(&sql, params![pid, name, now_utc()])?;

        let uid = conn.last_insert_rowid();
        info!("[Repos::Identity] Created {} '{}' ({})", kind.label(), name, uid);

        Ok(IdentityRow {
            uid,
            name: name.to_string(),
        })
    }

    /// 全量加载一张维度表（加速路径预载缓存用）
    pub fn load_all(
        conn: &Connection,
        kind: IdentityKind,
        pid: i64,
    ) -> TextDbResult<Vec<IdentityRow>> {
        let sql = format!("SELECT uid, name FROM {} WHERE pid = ?1", kind.table());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![pid], |row| {
                Ok(IdentityRow {
                    uid: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "[Repos::Identity] Preloaded {} {} rows",
            rows.len(),
            kind.table()
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TextDb;

    #[test]
    fn test_resolve_creates_once() {
        let db = TextDb::new_in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        let mut cache = IdentityCache::new();

        let first = IdentityRepo::resolve(&conn, &mut cache, IdentityKind::Component, 0, "auth", true)
            .unwrap()
            .unwrap();
        let second =
            IdentityRepo::resolve(&conn, &mut cache, IdentityKind::Component, 0, "auth", true)
                .unwrap()
                .unwrap();

        assert_eq!(first, second);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM components", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_resolve_without_create_returns_none() {
        let db = TextDb::new_in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        let mut cache = IdentityCache::new();

        let result =
            IdentityRepo::resolve(&conn, &mut cache, IdentityKind::Type, 0, "missing", false)
                .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let db = TextDb::new_in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        let mut cache = IdentityCache::new();

        let lower =
            IdentityRepo::resolve(&conn, &mut cache, IdentityKind::Environment, 0, "default", true)
                .unwrap()
                .unwrap();
        let upper =
            IdentityRepo::resolve(&conn, &mut cache, IdentityKind::Environment, 0, "Default", true)
                .unwrap()
                .unwrap();

        assert_ne!(lower.uid, upper.uid);
    }

    #[test]
    fn test_storage_scope_isolation() {
        let db = TextDb::new_in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        let mut cache_a = IdentityCache::new();
        let mut cache_b = IdentityCache::new();

        let a = IdentityRepo::resolve(&conn, &mut cache_a, IdentityKind::Component, 1, "auth", true)
            .unwrap()
            .unwrap();
        let b = IdentityRepo::resolve(&conn, &mut cache_b, IdentityKind::Component, 2, "auth", true)
            .unwrap()
            .unwrap();

        // 不同存储范围各自一行
        assert_ne!(a.uid, b.uid);
    }

    #[test]
    fn test_cache_hit_skips_database() {
        let db = TextDb::new_in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        let mut cache = IdentityCache::new();

        IdentityRepo::resolve(&conn, &mut cache, IdentityKind::Component, 0, "auth", true)
            .unwrap()
            .unwrap();
        assert_eq!(cache.len(), 1);

        // 表被清空后缓存仍然命中——运行中缓存从不失效（单写者假设）
        conn.execute("DELETE FROM components", []).unwrap();
        let hit = IdentityRepo::resolve(&conn, &mut cache, IdentityKind::Component, 0, "auth", true)
            .unwrap();
        assert!(hit.is_some());
    }

    #[test]
    fn test_preload() {
        let db = TextDb::new_in_memory().unwrap();
        let conn = db.get_conn().unwrap();
        let mut cache = IdentityCache::new();

        IdentityRepo::create(&conn, IdentityKind::Type, 0, "label").unwrap();
        IdentityRepo::create(&conn, IdentityKind::Type, 0, "button").unwrap();

        let rows = IdentityRepo::load_all(&conn, IdentityKind::Type, 0).unwrap();
        assert_eq!(rows.len(), 2);

        cache.preload(IdentityKind::Type, rows);
        assert_eq!(cache.len(), 2);
    }
}
