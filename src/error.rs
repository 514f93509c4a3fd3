//! TextDB 错误类型定义
//!
//! 本模块定义导入流水线的错误类型和结果类型别名。

use std::fmt;

/// TextDB 操作结果类型别名
pub type TextDbResult<T> = Result<T, TextDbError>;

/// TextDB 错误类型
#[derive(Debug)]
pub enum TextDbError {
    /// 数据库错误
    Database(String),

    /// 连接池错误
    Pool(String),

    /// IO 错误（文件操作）
    Io(String),

    /// 序列化/反序列化错误
    Serialization(String),

    /// XLIFF 文件解析失败（整个文件级别，无部分结果）
    Decode { file: String, reason: String },

    /// 翻译键格式错误（component|type|placeholder 三段式）
    InvalidKey { key: String, reason: String },

    /// 资源未找到
    NotFound { resource_type: String, id: String },

    /// 无效参数
    InvalidArgument { param: String, reason: String },

    /// 配置错误
    Configuration(String),

    /// 批量导入路径失败
    ///
    /// `code` 为负数错误码（见 `import::bulk::BulkErrorCode`），
    /// 上层据此决定中止还是降级。
    Bulk { code: i32, message: String },

    /// 其他错误
    Other(String),
}

impl fmt::Display for TextDbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextDbError::Database(msg) => write!(f, "Database error: {}", msg),
            TextDbError::Pool(msg) => write!(f, "Connection pool error: {}", msg),
            TextDbError::Io(msg) => write!(f, "IO error: {}", msg),
            TextDbError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            TextDbError::Decode { file, reason } => {
                write!(f, "Failed to decode '{}': {}", file, reason)
            }
            TextDbError::InvalidKey { key, reason } => {
                write!(f, "Invalid translation key '{}': {}", key, reason)
            }
            TextDbError::NotFound { resource_type, id } => {
                write!(f, "{} not found: {}", resource_type, id)
            }
            TextDbError::InvalidArgument { param, reason } => {
                write!(f, "Invalid argument '{}': {}", param, reason)
            }
            TextDbError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            TextDbError::Bulk { code, message } => {
                write!(f, "Bulk import failed ({}): {}", code, message)
            }
            TextDbError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TextDbError {}

// 从标准错误类型转换
impl From<std::io::Error> for TextDbError {
    fn from(err: std::io::Error) -> Self {
        TextDbError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TextDbError {
    fn from(err: serde_json::Error) -> Self {
        TextDbError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for TextDbError {
    fn from(err: rusqlite::Error) -> Self {
        TextDbError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for TextDbError {
    fn from(err: r2d2::Error) -> Self {
        TextDbError::Pool(err.to_string())
    }
}

// 转换为 String（用于对外接口返回）
impl From<TextDbError> for String {
    fn from(err: TextDbError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TextDbError::NotFound {
            resource_type: "Component".to_string(),
            id: "checkout".to_string(),
        };
        assert_eq!(err.to_string(), "Component not found: checkout");

        let err = TextDbError::InvalidKey {
            key: "auth|label".to_string(),
            reason: "missing placeholder segment".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid translation key 'auth|label': missing placeholder segment"
        );
    }

    #[test]
    fn test_error_to_string() {
        let err = TextDbError::Database("connection failed".to_string());
        let s: String = err.into();
        assert_eq!(s, "Database error: connection failed");
    }

    #[test]
    fn test_bulk_error_carries_code() {
        let err = TextDbError::Bulk {
            code: -2,
            message: "connect refused".to_string(),
        };
        assert_eq!(err.to_string(), "Bulk import failed (-2): connect refused");
    }
}
