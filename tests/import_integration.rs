//! 导入流水线端到端测试
//!
//! 覆盖两条导入路径的收敛性、目录导入的语言排序、
//! 以及文件 → 数据库的完整链路。

use std::path::Path;

use textdb_lib::xliff::TransUnit;
use textdb_lib::{Importer, Settings, TextDb};

fn unit(id: &str, target: &str) -> TransUnit {
    TransUnit {
        id: id.to_string(),
        source: target.to_string(),
        target: target.to_string(),
    }
}

fn write_xliff(path: &Path, units: &[(&str, &str)]) {
    let mut body = String::new();
    for (id, value) in units {
        body.push_str(&format!(
            "      <trans-unit id=\"{}\">\n        <source>{}</source>\n        <target>{}</target>\n      </trans-unit>\n",
            id, value, value
        ));
    }
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<xliff version=\"1.0\">\n  <file source-language=\"en\" datatype=\"plaintext\" original=\"messages\">\n    <body>\n{}    </body>\n  </file>\n</xliff>\n",
        body
    );
    std::fs::write(path, xml).unwrap();
}

/// 翻译表的可比对快照：值与父行链接（按占位符间接表达）
fn snapshot(db: &TextDb) -> Vec<(String, String, i64, bool)> {
    let conn = db.get_conn().unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT t.placeholder, t.value, t.language_id, t.l10n_parent != 0 \
             FROM translations t ORDER BY t.placeholder, t.language_id",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
        })
        .unwrap();
    rows.collect::<Result<Vec<_>, _>>().unwrap()
}

#[test]
fn first_import_on_empty_store_creates_everything() {
    let db = TextDb::new_in_memory().unwrap();
    let settings = Settings::default();
    let importer = Importer::new(&db, &settings);

    let outcome = importer
        .import_units(&[unit("auth|label|login_button", "Log in")], 0, false)
        .unwrap();

    assert_eq!(outcome.imported, 1);
    assert_eq!(outcome.updated, 0);
    assert!(outcome.errors.is_empty());

    let conn = db.get_conn().unwrap();
    for (table, name) in [
        ("environments", "default"),
        ("components", "auth"),
        ("types", "label"),
    ] {
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE name = ?1", table),
                [name],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "{} '{}' missing", table, name);
    }

    let value: String = conn
        .query_row(
            "SELECT value FROM translations WHERE placeholder = 'login_button' AND language_id = 0",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(value, "Log in");
}

#[test]
fn reimport_is_idempotent_without_force() {
    let db = TextDb::new_in_memory().unwrap();
    let settings = Settings::default();
    let importer = Importer::new(&db, &settings);

    let units: Vec<TransUnit> = (0..10)
        .map(|i| unit(&format!("auth|label|key_{}", i), &format!("Value {}", i)))
        .collect();

    let first = importer.import_units(&units, 0, false).unwrap();
    assert_eq!(first.imported, 10);

    let second = importer.import_units(&units, 0, false).unwrap();
    assert_eq!(second.imported, 0);
    assert_eq!(second.updated, 0);
}

#[test]
fn force_reimport_updates_all_values() {
    let db = TextDb::new_in_memory().unwrap();
    let settings = Settings::default();
    let importer = Importer::new(&db, &settings);

    let original: Vec<TransUnit> = (0..10)
        .map(|i| unit(&format!("auth|label|key_{}", i), "old"))
        .collect();
    importer.import_units(&original, 0, false).unwrap();

    let changed: Vec<TransUnit> = (0..10)
        .map(|i| unit(&format!("auth|label|key_{}", i), "new"))
        .collect();
    let outcome = importer.import_units(&changed, 0, true).unwrap();

    assert_eq!(outcome.imported, 0);
    assert_eq!(outcome.updated, 10);

    let conn = db.get_conn().unwrap();
    let stale: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM translations WHERE value = 'old'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(stale, 0);
}

#[test]
fn both_paths_converge_to_identical_state() {
    // 同一输入序列分别走加速路径与常规路径，最终表状态必须一致
    let mut units: Vec<TransUnit> = (0..50)
        .map(|i| unit(&format!("checkout|button|pay_{}", i), &format!("Pay {}", i)))
        .collect();
    units.push(unit("auth|label|login", "Log in"));
    let localized: Vec<TransUnit> = (0..50)
        .map(|i| unit(&format!("checkout|button|pay_{}", i), &format!("Zahlen {}", i)))
        .collect();

    let run = |accelerated: bool| {
        let db = TextDb::new_in_memory().unwrap();
        let settings = Settings {
            accelerated,
            ..Settings::default()
        };
        let importer = Importer::new(&db, &settings);
        let expected = if accelerated { "bulk" } else { "conventional" };
        assert_eq!(importer.strategy_name(), expected);

        importer.import_units(&units, 0, false).unwrap();
        importer.import_units(&localized, 2, false).unwrap();
        // 重导入 + 强制更新混合
        importer.import_units(&units, 0, false).unwrap();
        importer.import_units(&localized, 2, true).unwrap();
        snapshot(&db)
    };

    let bulk_state = run(true);
    let conventional_state = run(false);
    assert_eq!(bulk_state, conventional_state);
    assert_eq!(bulk_state.len(), 101);
}

#[test]
fn batch_boundaries_preserve_counts() {
    for total in [4_usize, 5, 6, 11] {
        let db = TextDb::new_in_memory().unwrap();
        let settings = Settings {
            insert_batch_size: 5,
            lookup_batch_size: 5,
            ..Settings::default()
        };
        let importer = Importer::new(&db, &settings);

        let units: Vec<TransUnit> = (0..total)
            .map(|i| unit(&format!("auth|label|key_{}", i), &format!("Value {}", i)))
            .collect();

        let outcome = importer.import_units(&units, 0, false).unwrap();
        assert_eq!(outcome.imported as usize, total, "total = {}", total);

        let conn = db.get_conn().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM translations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, total);
    }
}

#[test]
fn localized_rows_link_to_default_parents_on_both_paths() {
    for accelerated in [true, false] {
        let db = TextDb::new_in_memory().unwrap();
        let settings = Settings {
            accelerated,
            ..Settings::default()
        };
        let importer = Importer::new(&db, &settings);

        importer
            .import_units(&[unit("auth|label|login", "Log in")], 0, false)
            .unwrap();
        importer
            .import_units(&[unit("auth|label|login", "Anmelden")], 2, false)
            .unwrap();

        let conn = db.get_conn().unwrap();
        let (parent_uid, child_parent): (i64, i64) = conn
            .query_row(
                "SELECT p.uid, c.l10n_parent FROM translations p, translations c \
                 WHERE p.language_id = 0 AND c.language_id = 2",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(child_parent, parent_uid, "accelerated = {}", accelerated);
    }
}

#[test]
fn stub_rows_accept_first_real_value_without_force() {
    for accelerated in [true, false] {
        let db = TextDb::new_in_memory().unwrap();
        let settings = Settings {
            accelerated,
            ..Settings::default()
        };
        let importer = Importer::new(&db, &settings);

        // value == placeholder 的占位行
        importer
            .import_units(&[unit("auth|label|login", "login")], 0, false)
            .unwrap();
        let outcome = importer
            .import_units(&[unit("auth|label|login", "Log in")], 0, false)
            .unwrap();
        assert_eq!(outcome.updated, 1, "accelerated = {}", accelerated);
    }
}

#[test]
fn in_file_stub_duplicates_converge_across_paths() {
    // 同一文件里先占位值后真实值：两条路径的计数与最终值必须一致
    let units = vec![
        unit("auth|label|login", "login"),
        unit("auth|label|login", "Log in"),
    ];

    let run = |accelerated: bool| {
        let db = TextDb::new_in_memory().unwrap();
        let settings = Settings {
            accelerated,
            ..Settings::default()
        };
        let importer = Importer::new(&db, &settings);
        let outcome = importer.import_units(&units, 0, false).unwrap();
        (outcome.imported, outcome.updated, snapshot(&db))
    };

    let bulk = run(true);
    let conventional = run(false);
    assert_eq!(bulk, conventional);
    assert_eq!(bulk.0, 1);
    assert_eq!(bulk.1, 1);
    assert_eq!(bulk.2[0].1, "Log in");
}

#[test]
fn stray_rows_outside_a_run_keep_their_parent_links() {
    // 游离的未链接本地化行不被后续无关导入改动，两条路径一致
    let run = |accelerated: bool| {
        let db = TextDb::new_in_memory().unwrap();
        let settings = Settings {
            accelerated,
            ..Settings::default()
        };
        let importer = Importer::new(&db, &settings);

        importer
            .import_units(&[unit("auth|label|login", "Anmelden")], 2, false)
            .unwrap();
        importer
            .import_units(
                &[unit("auth|label|login", "Log in"), unit("auth|label|other", "Other")],
                0,
                false,
            )
            .unwrap();
        importer
            .import_units(&[unit("auth|label|other", "Andere")], 2, false)
            .unwrap();
        snapshot(&db)
    };

    let bulk = run(true);
    let conventional = run(false);
    assert_eq!(bulk, conventional);

    // 游离行（login, lang 2）始终未链接
    let stray = bulk
        .iter()
        .find(|(placeholder, _, language, _)| placeholder.as_str() == "login" && *language == 2)
        .unwrap();
    assert!(!stray.3);
}

#[test]
fn import_file_derives_language_from_filename() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("de.textdb_import.xlf");
    write_xliff(&path, &[("auth|label|login", "Anmelden")]);

    let db = TextDb::new_in_memory().unwrap();
    let mut settings = Settings::default();
    settings.languages.insert("de".to_string(), 2);
    let importer = Importer::new(&db, &settings);

    let outcome = importer.import_file(&path, false).unwrap();
    assert_eq!(outcome.imported, 1);

    let conn = db.get_conn().unwrap();
    let language_id: i64 = conn
        .query_row(
            "SELECT language_id FROM translations WHERE placeholder = 'login'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(language_id, 2);
}

#[test]
fn directory_import_processes_default_language_first() {
    let dir = tempfile::tempdir().unwrap();
    // 字典序上 de 在前，导入顺序必须按语言升序把默认语言排到最前
    write_xliff(
        &dir.path().join("de.textdb_import.xlf"),
        &[("auth|label|login", "Anmelden")],
    );
    write_xliff(
        &dir.path().join("textdb_import.xlf"),
        &[("auth|label|login", "Log in")],
    );
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let db = TextDb::new_in_memory().unwrap();
    let mut settings = Settings::default();
    settings.languages.insert("de".to_string(), 2);
    let importer = Importer::new(&db, &settings);

    let outcome = importer.import_directory(dir.path(), false).unwrap();
    assert_eq!(outcome.imported, 2);
    assert!(outcome.errors.is_empty());

    let conn = db.get_conn().unwrap();
    let unlinked: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM translations WHERE language_id = 2 AND l10n_parent = 0",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(unlinked, 0);
}

#[test]
fn malformed_file_fails_whole_file_but_not_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("textdb_broken.xlf"),
        "<?xml version=\"1.0\"?><xliff><file><body></file></xliff>",
    )
    .unwrap();
    write_xliff(
        &dir.path().join("textdb_import.xlf"),
        &[("auth|label|login", "Log in")],
    );

    let db = TextDb::new_in_memory().unwrap();
    let settings = Settings::default();
    let importer = Importer::new(&db, &settings);

    let outcome = importer.import_directory(dir.path(), false).unwrap();
    assert_eq!(outcome.imported, 1);
    assert_eq!(outcome.errors.len(), 1);
}
