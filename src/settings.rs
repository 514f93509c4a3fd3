//! 运行时配置
//!
//! 配置来源分层：`textdb.toml`（可选）→ `TEXTDB_` 前缀环境变量。
//! 开发环境下通过 dotenvy 加载 `.env`。

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{TextDbError, TextDbResult};

/// 身份解析失败时的处理策略
///
/// 旧行为是静默跳过条目，不留任何痕迹。默认改为记录错误，
/// 静默跳过仅作为显式配置保留。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingIdentityPolicy {
    /// 该条目失败并记入错误列表（默认）
    RecordError,
    /// 静默跳过该条目
    Skip,
}

impl Default for MissingIdentityPolicy {
    fn default() -> Self {
        MissingIdentityPolicy::RecordError
    }
}

/// TextDB 运行时配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// SQLite 数据库文件路径
    pub database_path: PathBuf,

    /// 存储范围（对应原系统的 pid），所有记录限定在此范围内
    pub pid: i64,

    /// 导入条目归属的执行环境名
    pub environment: String,

    /// 全局 create-if-missing 默认值（逐调用覆盖优先）
    pub create_if_missing: bool,

    /// 是否启用加速批量导入路径（能力探测仍需通过）
    pub accelerated: bool,

    /// 批量插入的每批行数
    pub insert_batch_size: usize,

    /// 批量存在性查询的每批行数
    pub lookup_batch_size: usize,

    /// 身份解析失败策略
    pub missing_identity_policy: MissingIdentityPolicy,

    /// 语言代码到语言 ID 的映射（"default" 恒为 0，无需配置）
    ///
    /// 例：`[languages]` 下 `de = 1`、`fr = 2`。未配置的代码按 0 处理。
    pub languages: HashMap<String, i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("textdb.db"),
            pid: 0,
            environment: "default".to_string(),
            create_if_missing: false,
            accelerated: true,
            insert_batch_size: 500,
            lookup_batch_size: 1000,
            missing_identity_policy: MissingIdentityPolicy::default(),
            languages: HashMap::new(),
        }
    }
}

impl Settings {
    /// 加载配置：`textdb.toml`（可选）+ `TEXTDB_` 环境变量覆盖
    pub fn load() -> TextDbResult<Self> {
        dotenvy::dotenv().ok();
        Self::load_from("textdb")
    }

    /// 从指定配置名加载（测试使用）
    pub fn load_from(name: &str) -> TextDbResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(name).required(false))
            .add_source(
                config::Environment::with_prefix("TEXTDB")
                    .separator("__")
                    .try_parsing(true),
            );

        builder
            .build()
            .map_err(|e| TextDbError::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| TextDbError::Configuration(e.to_string()))
    }

    /// 语言代码 → 语言 ID
    ///
    /// "default" 映射到基准语言 0；未知代码同样落到 0，
    /// 与原系统行为一致（未配置的站点语言按默认语言导入）。
    pub fn language_id(&self, language_key: &str) -> i64 {
        if language_key == "default" {
            return 0;
        }

        match self.languages.get(language_key) {
            Some(&id) => id.max(-1),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.insert_batch_size, 500);
        assert_eq!(settings.lookup_batch_size, 1000);
        assert!(settings.accelerated);
        assert!(!settings.create_if_missing);
        assert_eq!(
            settings.missing_identity_policy,
            MissingIdentityPolicy::RecordError
        );
    }

    #[test]
    fn test_language_id_mapping() {
        let mut settings = Settings::default();
        settings.languages.insert("de".to_string(), 1);
        settings.languages.insert("fr".to_string(), 2);

        assert_eq!(settings.language_id("default"), 0);
        assert_eq!(settings.language_id("de"), 1);
        assert_eq!(settings.language_id("fr"), 2);
        // 未配置的代码落到默认语言
        assert_eq!(settings.language_id("zz"), 0);
    }

    #[test]
    fn test_language_id_clamps_to_all_languages_sentinel() {
        let mut settings = Settings::default();
        settings.languages.insert("all".to_string(), -5);
        // -1 是"所有语言"哨兵值，更小的配置值被钳制
        assert_eq!(settings.language_id("all"), -1);
    }
}
