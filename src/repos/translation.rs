//! 翻译表 CRUD 操作
//!
//! 五元组 (environment, component, type, placeholder, language_id) 唯一，
//! 是对账算法的查找键。导入路径无视 hidden 标志（对账必须看到隐藏行），
//! 读取路径（translate）尊重 hidden。
//!
//! ## auto-created 约定
//! value == placeholder 的行是"占位行"：由读取路径在启用 create-if-missing
//! 时惰性物化，尚未获得真实译文。对账时此类行必须无条件接受第一个
//! 真实值，无论调用方是否要求强制更新。

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::database::now_utc;
use crate::error::TextDbResult;
use crate::repos::identity::{IdentityCache, IdentityKind, IdentityRepo};

/// 一行翻译记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub uid: i64,
    pub pid: i64,
    pub environment: i64,
    pub component: i64,
    pub type_uid: i64,
    pub placeholder: String,
    pub value: String,
    pub language_id: i64,
    pub l10n_parent: i64,
    pub hidden: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Translation {
    /// 占位行判定：值等于占位符本身
    pub fn is_auto_created(&self) -> bool {
        self.value == self.placeholder
    }
}

const TRANSLATION_COLUMNS: &str = "uid, pid, environment, component, type, placeholder, value, \
     language_id, l10n_parent, hidden, created_at, updated_at";

/// 翻译表仓储
pub struct TranslationRepo;

impl TranslationRepo {
    // ========================================================================
    // 查询
    // ========================================================================

    /// 按五元组精确查找（导入路径，hidden 行也返回）
    pub fn find_by_tuple(
        conn: &Connection,
        environment: i64,
        component: i64,
        type_uid: i64,
        placeholder: &str,
        language_id: i64,
    ) -> TextDbResult<Option<Translation>> {
        let sql = format!(
            "SELECT {} FROM translations \
             WHERE environment = ?1 AND component = ?2 AND type = ?3 \
               AND placeholder = ?4 AND language_id = ?5",
            TRANSLATION_COLUMNS
        );

        let translation = conn
            .query_row(
                &sql,
                params![environment, component, type_uid, placeholder, language_id],
                Self::row_to_translation,
            )
            .optional()?;

        Ok(translation)
    }

    /// 查找默认语言（language_id = 0）父行
    pub fn find_default_parent(
        conn: &Connection,
        environment: i64,
        component: i64,
        type_uid: i64,
        placeholder: &str,
    ) -> TextDbResult<Option<Translation>> {
        Self::find_by_tuple(conn, environment, component, type_uid, placeholder, 0)
    }

    // ========================================================================
    // 写入
    // ========================================================================

    /// 插入翻译行
    ///
    /// 值按导入内容原样存储——显式导入路径绝不把值默认为占位符，
    /// 占位行只由 `find_entry` 的物化路径产生。
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        conn: &Connection,
        pid: i64,
        environment: i64,
        component: i64,
        type_uid: i64,
        placeholder: &str,
        value: &str,
        language_id: i64,
        l10n_parent: i64,
    ) -> TextDbResult<Translation> {
        let now = now_utc();

        conn.execute(
            "INSERT INTO translations \
             (pid, environment, component, type, placeholder, value, language_id, l10n_parent, \
              hidden, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)",
            params![
                pid,
                environment,
                component,
                type_uid,
                placeholder,
                value,
                language_id,
                l10n_parent,
                now,
            ],
        )?;

        let uid = conn.last_insert_rowid();
        debug!(
            "[Repos::Translation] Inserted translation {} ('{}', lang {})",
            uid, placeholder, language_id
        );

        Ok(Translation {
            uid,
            pid,
            environment,
            component,
            type_uid,
            placeholder: placeholder.to_string(),
            value: value.to_string(),
            language_id,
            l10n_parent,
            hidden: false,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// 更新翻译值（可同时设置父行链接）
    pub fn update_value(
        conn: &Connection,
        uid: i64,
        value: &str,
        l10n_parent: Option<i64>,
    ) -> TextDbResult<()> {
        let now = now_utc();

        match l10n_parent {
            Some(parent) => {
                conn.execute(
                    "UPDATE translations SET value = ?1, l10n_parent = ?2, updated_at = ?3 \
                     WHERE uid = ?4",
                    params![value, parent, now, uid],
                )?;
            }
            None => {
                conn.execute(
                    "UPDATE translations SET value = ?1, updated_at = ?2 WHERE uid = ?3",
                    params![value, now, uid],
                )?;
            }
        }

        Ok(())
    }

    // ========================================================================
    // 读取路径（translate）
    // ========================================================================

    /// 按名称查找翻译值，供展示层使用
    ///
    /// 身份解析不创建缺失行；任一身份缺失或翻译不存在时返回 None，
    /// 调用方以占位符本身兜底展示。hidden 行视为不存在。
    /// 请求语言无记录时回退默认语言（language_id = 0）。
    ///
    /// `create_if_missing` 开启时，查无记录会物化一条占位行
    /// （language 0，value = placeholder），供后续导入填充真实值。
    #[allow(clippy::too_many_arguments)]
    pub fn find_entry(
        conn: &Connection,
        cache: &mut IdentityCache,
        pid: i64,
        environment: &str,
        component: &str,
        type_name: &str,
        placeholder: &str,
        language_id: i64,
        create_if_missing: bool,
    ) -> TextDbResult<Option<Translation>> {
        let env = IdentityRepo::resolve(
            conn,
            cache,
            IdentityKind::Environment,
            pid,
            environment,
            create_if_missing,
        )?;
        let comp = IdentityRepo::resolve(
            conn,
            cache,
            IdentityKind::Component,
            pid,
            component,
            create_if_missing,
        )?;
        let typ = IdentityRepo::resolve(
            conn,
            cache,
            IdentityKind::Type,
            pid,
            type_name,
            create_if_missing,
        )?;

        let (Some(env), Some(comp), Some(typ)) = (env, comp, typ) else {
            return Ok(None);
        };

        // 请求语言 → 默认语言回退
        let mut translation =
            Self::find_by_tuple(conn, env.uid, comp.uid, typ.uid, placeholder, language_id)?;
        if translation.is_none() && language_id != 0 {
            translation = Self::find_by_tuple(conn, env.uid, comp.uid, typ.uid, placeholder, 0)?;
        }

        if let Some(found) = translation {
            if found.hidden {
                return Ok(None);
            }
            return Ok(Some(found));
        }

        if !create_if_missing {
            return Ok(None);
        }

        // 物化占位行：value = placeholder（auto-created 约定）
        let stub = Self::insert(
            conn,
            pid,
            env.uid,
            comp.uid,
            typ.uid,
            placeholder,
            placeholder,
            0,
            0,
        )?;
        info!(
            "[Repos::Translation] Materialized auto-created stub for '{}|{}|{}'",
            component, type_name, placeholder
        );
        Ok(Some(stub))
    }

    // ========================================================================
    // 辅助方法
    // ========================================================================

    /// 从行数据构建 Translation
    ///
    /// 列顺序: uid, pid, environment, component, type, placeholder, value,
    ///        language_id, l10n_parent, hidden, created_at, updated_at
    fn row_to_translation(row: &rusqlite::Row) -> rusqlite::Result<Translation> {
        Ok(Translation {
            uid: row.get(0)?,
            pid: row.get(1)?,
            environment: row.get(2)?,
            component: row.get(3)?,
            type_uid: row.get(4)?,
            placeholder: row.get(5)?,
            value: row.get(6)?,
            language_id: row.get(7)?,
            l10n_parent: row.get(8)?,
            hidden: row.get::<_, i64>(9)? != 0,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}
