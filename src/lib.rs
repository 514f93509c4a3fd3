// TextDB library entry
// 翻译库导入流水线：XLIFF 解码 → 键分解 → 身份解析 → 对账写入。
// bin 目标只做参数解析与日志初始化，全部逻辑经由本库导出。

pub mod database;
pub mod error;
pub mod import;
pub mod job_manager;
pub mod key;
pub mod repos;
pub mod settings;
pub mod xliff;

pub use database::TextDb;
pub use error::{TextDbError, TextDbResult};
pub use import::{ImportOutcome, Importer};
pub use job_manager::ImportJobManager;
pub use settings::Settings;
