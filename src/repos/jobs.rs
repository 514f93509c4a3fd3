//! 导入任务表 CRUD 操作
//!
//! 任务状态机：pending → processing → completed | failed。
//! 状态流转由 `ImportJobManager` 驱动，本模块只负责持久化。

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::now_utc;
use crate::error::{TextDbError, TextDbResult};

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> TextDbResult<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(TextDbError::InvalidArgument {
                param: "status".to_string(),
                reason: format!("unknown job status '{}'", other),
            }),
        }
    }

    /// 终态不再流转
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// 一条导入任务记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub job_id: String,
    pub file_path: String,
    pub original_filename: String,
    pub file_size: i64,
    pub force_update: bool,
    pub status: JobStatus,
    pub imported: i64,
    pub updated: i64,
    pub error_message: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// 导入任务仓储
pub struct ImportJobRepo;

impl ImportJobRepo {
    /// 登记新任务（状态 pending）
    pub fn create(
        conn: &Connection,
        file_path: &str,
        original_filename: &str,
        file_size: i64,
        force_update: bool,
    ) -> TextDbResult<ImportJob> {
        let job_id = Uuid::new_v4().to_string();
        let now = now_utc();

        conn.execute(
            "INSERT INTO import_jobs \
             (job_id, file_path, original_filename, file_size, force_update, status, \
              imported, updated, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, 0, ?6)",
            params![
                job_id,
                file_path,
                original_filename,
                file_size,
                force_update as i64,
                now,
            ],
        )?;

        info!(
            "[Repos::Jobs] Created import job {} for '{}'",
            job_id, original_filename
        );

        Ok(ImportJob {
            job_id,
            file_path: file_path.to_string(),
            original_filename: original_filename.to_string(),
            file_size,
            force_update,
            status: JobStatus::Pending,
            imported: 0,
            updated: 0,
            error_message: None,
            created_at: now,
            started_at: None,
            finished_at: None,
        })
    }

    /// 更新任务状态
    ///
    /// processing 记录 started_at，终态记录 finished_at。
    pub fn update_status(
        conn: &Connection,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> TextDbResult<()> {
        let now = now_utc();

        let changed = match status {
            JobStatus::Processing => conn.execute(
                "UPDATE import_jobs SET status = ?1, started_at = ?2, error_message = ?3 \
                 WHERE job_id = ?4",
                params![status.as_str(), now, error_message, job_id],
            )?,
            JobStatus::Completed | JobStatus::Failed => conn.execute(
                "UPDATE import_jobs SET status = ?1, finished_at = ?2, error_message = ?3 \
                 WHERE job_id = ?4",
                params![status.as_str(), now, error_message, job_id],
            )?,
            JobStatus::Pending => conn.execute(
                "UPDATE import_jobs SET status = ?1, error_message = ?2 WHERE job_id = ?3",
                params![status.as_str(), error_message, job_id],
            )?,
        };

        if changed == 0 {
            return Err(TextDbError::NotFound {
                resource_type: "import job".to_string(),
                id: job_id.to_string(),
            });
        }

        debug!("[Repos::Jobs] Job {} -> {}", job_id, status.as_str());
        Ok(())
    }

    /// 回写导入统计
    pub fn update_progress(
        conn: &Connection,
        job_id: &str,
        imported: i64,
        updated: i64,
    ) -> TextDbResult<()> {
        let changed = conn.execute(
            "UPDATE import_jobs SET imported = ?1, updated = ?2 WHERE job_id = ?3",
            params![imported, updated, job_id],
        )?;

        if changed == 0 {
            return Err(TextDbError::NotFound {
                resource_type: "import job".to_string(),
                id: job_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按 job_id 查询
    pub fn find_by_job_id(conn: &Connection, job_id: &str) -> TextDbResult<Option<ImportJob>> {
        let job = conn
            .query_row(
                "SELECT job_id, file_path, original_filename, file_size, force_update, status, \
                        imported, updated, error_message, created_at, started_at, finished_at \
                 FROM import_jobs WHERE job_id = ?1",
                params![job_id],
                Self::row_to_job,
            )
            .optional()?;

        Ok(job)
    }

    /// 清理早于给定天数的终态任务，返回删除行数
    pub fn delete_finished_before(conn: &Connection, days: i64) -> TextDbResult<usize> {
        // 截止时间用与存储相同的格式生成，字符串比较才成立
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days))
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();

        let deleted = conn.execute(
            "DELETE FROM import_jobs \
             WHERE status IN ('completed', 'failed') AND finished_at < ?1",
            params![cutoff],
        )?;

        if deleted > 0 {
            info!("[Repos::Jobs] Cleaned up {} finished jobs", deleted);
        }
        Ok(deleted)
    }

    /// 从行数据构建 ImportJob
    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<ImportJob> {
        let status_str: String = row.get(5)?;
        let status = JobStatus::parse(&status_str).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("invalid job status '{}'", status_str).into(),
            )
        })?;

        Ok(ImportJob {
            job_id: row.get(0)?,
            file_path: row.get(1)?,
            original_filename: row.get(2)?,
            file_size: row.get(3)?,
            force_update: row.get::<_, i64>(4)? != 0,
            status,
            imported: row.get(6)?,
            updated: row.get(7)?,
            error_message: row.get(8)?,
            created_at: row.get(9)?,
            started_at: row.get(10)?,
            finished_at: row.get(11)?,
        })
    }
}
