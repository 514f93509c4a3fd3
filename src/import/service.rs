//! 常规逐条导入路径
//!
//! 对每个条目独立执行"查找 → 判定 → 写入"对账，逐条提交。
//! 单条失败记入错误列表后继续，绝不打断整个文件。
//! 吞吐量低于批量路径，但逻辑直白，是降级兜底与正确性基准。

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::TextDbResult;
use crate::import::ImportOutcome;
use crate::key::TranslationKey;
use crate::repos::{IdentityCache, IdentityKind, IdentityRepo, TranslationRepo};
use crate::settings::{MissingIdentityPolicy, Settings};
use crate::xliff::TransUnit;

/// 单条目对账结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// 新插入
    Inserted,
    /// 已存在且执行了更新
    Updated,
    /// 已存在且保持原值
    Skipped,
}

/// 逐条导入一批条目
///
/// 导入路径的身份解析始终开启 auto-create：维度行是导入的副产品，
/// 不是前置条件。解析失败时按 `missing_identity_policy` 处理。
pub fn import_units(
    conn: &Connection,
    settings: &Settings,
    units: &[TransUnit],
    language_id: i64,
    force: bool,
) -> TextDbResult<ImportOutcome> {
    let mut cache = IdentityCache::new();
    let mut outcome = ImportOutcome::default();

    for unit in units {
        match import_entry(conn, settings, &mut cache, unit, language_id, force) {
            Ok(Some(EntryOutcome::Inserted)) => outcome.imported += 1,
            Ok(Some(EntryOutcome::Updated)) => outcome.updated += 1,
            Ok(Some(EntryOutcome::Skipped)) | Ok(None) => {}
            Err(e) => {
                // 条目级隔离：记录并继续
                warn!("[Import::Service] Entry '{}' failed: {}", unit.id, e);
                outcome.errors.push(format!("{}: {}", unit.id, e));
            }
        }
    }

    debug!(
        "[Import::Service] Conventional path done: {} inserted, {} updated, {} errors",
        outcome.imported,
        outcome.updated,
        outcome.errors.len()
    );
    Ok(outcome)
}

/// 对账单个条目
///
/// 返回 `None` 表示按策略静默跳过（身份无法解析且策略为 skip）。
fn import_entry(
    conn: &Connection,
    settings: &Settings,
    cache: &mut IdentityCache,
    unit: &TransUnit,
    language_id: i64,
    force: bool,
) -> TextDbResult<Option<EntryOutcome>> {
    let key = TranslationKey::parse(&unit.id)?;
    let pid = settings.pid;

    let env = IdentityRepo::resolve(
        conn,
        cache,
        IdentityKind::Environment,
        pid,
        &settings.environment,
        true,
    )?;
    let comp =
        IdentityRepo::resolve(conn, cache, IdentityKind::Component, pid, &key.component, true)?;
    let typ = IdentityRepo::resolve(conn, cache, IdentityKind::Type, pid, &key.type_name, true)?;

    let (Some(env), Some(comp), Some(typ)) = (env, comp, typ) else {
        return match settings.missing_identity_policy {
            MissingIdentityPolicy::Skip => Ok(None),
            MissingIdentityPolicy::RecordError => Err(crate::error::TextDbError::NotFound {
                resource_type: "identity".to_string(),
                id: unit.id.clone(),
            }),
        };
    };

    let existing =
        TranslationRepo::find_by_tuple(conn, env.uid, comp.uid, typ.uid, &key.placeholder, language_id)?;

    match existing {
        Some(found) => {
            // 占位行（value == placeholder）必须接受第一个真实值，
            // 无论调用方是否要求强制更新
            let force_effective = force || found.is_auto_created();
            if !force_effective {
                return Ok(Some(EntryOutcome::Skipped));
            }

            // -1（全语言哨兵）不链接父行
            let parent = if language_id > 0 {
                TranslationRepo::find_default_parent(
                    conn,
                    env.uid,
                    comp.uid,
                    typ.uid,
                    &key.placeholder,
                )?
                .map(|p| p.uid)
            } else {
                None
            };

            TranslationRepo::update_value(conn, found.uid, unit.value(), parent)?;
            Ok(Some(EntryOutcome::Updated))
        }
        None => {
            // 父行缺失时链接保持 0，按语言升序导入可避免这种情况
            let l10n_parent = if language_id > 0 {
                TranslationRepo::find_default_parent(
                    conn,
                    env.uid,
                    comp.uid,
                    typ.uid,
                    &key.placeholder,
                )?
                .map(|p| p.uid)
                .unwrap_or(0)
            } else {
                0
            };

            TranslationRepo::insert(
                conn,
                pid,
                env.uid,
                comp.uid,
                typ.uid,
                &key.placeholder,
                unit.value(),
                language_id,
                l10n_parent,
            )?;
            Ok(Some(EntryOutcome::Inserted))
        }
    }
}
