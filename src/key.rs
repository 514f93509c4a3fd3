//! 翻译键分解
//!
//! 复合键格式：`component|type|placeholder`。前两个 `|` 处切分，
//! placeholder 段吸收余下全部文本（允许再含 `|`）。
//! 任一段为空即判定键非法——宁可大声失败，不做静默兜底。

use crate::error::{TextDbError, TextDbResult};

/// 分解后的翻译键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationKey {
    pub component: String,
    pub type_name: String,
    pub placeholder: String,
}

impl TranslationKey {
    /// 分解复合键
    ///
    /// # Errors
    /// 分隔符不足两个，或任一段为空。
    pub fn parse(key: &str) -> TextDbResult<Self> {
        let invalid = |reason: &str| TextDbError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let (component, rest) = key
            .split_once('|')
            .ok_or_else(|| invalid("expected 'component|type|placeholder'"))?;

        let (type_name, placeholder) = rest
            .split_once('|')
            .ok_or_else(|| invalid("missing placeholder segment"))?;

        if component.is_empty() {
            return Err(invalid("empty component segment"));
        }
        if type_name.is_empty() {
            return Err(invalid("empty type segment"));
        }
        if placeholder.is_empty() {
            return Err(invalid("empty placeholder segment"));
        }

        Ok(Self {
            component: component.to_string(),
            type_name: type_name.to_string(),
            placeholder: placeholder.to_string(),
        })
    }
}

impl std::fmt::Display for TranslationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.component, self.type_name, self.placeholder
        )
    }
}
