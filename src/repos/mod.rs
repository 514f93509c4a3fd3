//! 仓储层
//!
//! 维度表（environments/components/types）、翻译表与导入任务表的
//! CRUD 操作。所有方法接收 `&Connection`，由调用方掌控连接与事务，
//! 批量路径得以把整个文件包进单个事务。

pub mod identity;
pub mod jobs;
pub mod translation;

pub use identity::{IdentityCache, IdentityKind, IdentityRepo, IdentityRow};
pub use jobs::{ImportJob, ImportJobRepo, JobStatus};
pub use translation::{Translation, TranslationRepo};
