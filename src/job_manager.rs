//! 导入任务生命周期管理
//!
//! 把一次文件导入包进任务状态机：pending → processing →
//! completed/failed。导入本身的失败转化为任务的 failed 状态，
//! 不向调用方传播，调用方只看任务记录。

use std::path::Path;

use tracing::{info, warn};

use crate::database::TextDb;
use crate::error::{TextDbError, TextDbResult};
use crate::import::Importer;
use crate::repos::{ImportJob, ImportJobRepo, JobStatus};
use crate::settings::Settings;

/// 任务错误信息长度上限（数据库字段防爆）
const MAX_ERROR_MESSAGE_LEN: usize = 4000;

/// 导入任务管理器
pub struct ImportJobManager;

impl ImportJobManager {
    /// 登记新任务
    pub fn enqueue(db: &TextDb, file_path: &Path, force: bool) -> TextDbResult<ImportJob> {
        let file_size = std::fs::metadata(file_path).map(|m| m.len() as i64).unwrap_or(0);
        let original_filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let conn = db.get_conn()?;
        ImportJobRepo::create(
            &conn,
            &file_path.to_string_lossy(),
            &original_filename,
            file_size,
            force,
        )
    }

    /// 执行任务
    ///
    /// 导入失败落到任务的 failed 状态；本方法只在任务记录本身
    /// 无法读写时返回错误。上传的临时文件在成功与失败后都清理。
    pub fn process(db: &TextDb, settings: &Settings, job_id: &str) -> TextDbResult<()> {
        let job = {
            let conn = db.get_conn()?;
            let Some(job) = ImportJobRepo::find_by_job_id(&conn, job_id)? else {
                return Err(TextDbError::NotFound {
                    resource_type: "import job".to_string(),
                    id: job_id.to_string(),
                });
            };

            if job.status.is_terminal() {
                warn!(
                    "[JobManager] Job {} already {}, skipping",
                    job_id,
                    job.status.as_str()
                );
                return Ok(());
            }

            ImportJobRepo::update_status(&conn, job_id, JobStatus::Processing, None)?;
            job
        };
        // 连接在导入前归还：内存库连接池只有一个连接

        info!(
            "[JobManager] Processing job {} ({})",
            job_id, job.original_filename
        );

        let importer = Importer::new(db, settings);
        let result = importer.import_file(Path::new(&job.file_path), job.force_update);

        let conn = db.get_conn()?;
        match result {
            Ok(outcome) => {
                ImportJobRepo::update_progress(
                    &conn,
                    job_id,
                    outcome.imported as i64,
                    outcome.updated as i64,
                )?;

                let error_message = if outcome.errors.is_empty() {
                    None
                } else {
                    Some(truncate_errors(&outcome.errors))
                };
                ImportJobRepo::update_status(
                    &conn,
                    job_id,
                    JobStatus::Completed,
                    error_message.as_deref(),
                )?;

                info!(
                    "[JobManager] Job {} completed: {} imported, {} updated, {} entry errors",
                    job_id,
                    outcome.imported,
                    outcome.updated,
                    outcome.errors.len()
                );
            }
            Err(e) => {
                let message = truncate_errors(&[e.to_string()]);
                ImportJobRepo::update_status(&conn, job_id, JobStatus::Failed, Some(&message))?;
                warn!("[JobManager] Job {} failed: {}", job_id, message);
            }
        }

        Self::cleanup_upload(&job.file_path);
        Ok(())
    }

    /// 清理早于给定天数的终态任务
    pub fn cleanup_finished(db: &TextDb, days: i64) -> TextDbResult<usize> {
        let conn = db.get_conn()?;
        ImportJobRepo::delete_finished_before(&conn, days)
    }

    fn cleanup_upload(file_path: &str) {
        let path = Path::new(file_path);
        if !path.exists() {
            return;
        }
        if let Err(e) = std::fs::remove_file(path) {
            warn!("[JobManager] Failed to remove upload {}: {}", file_path, e);
        }
    }
}

fn truncate_errors(errors: &[String]) -> String {
    let mut message = errors.join("; ");
    if message.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
        message.push_str("...");
    }
    message
}
