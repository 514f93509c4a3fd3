//! TextDB 命令行入口
//!
//! 子命令覆盖导入流水线的全部操作面：单文件/目录导入、
//! 翻译查询、任务登记与执行、任务清理。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use textdb_lib::repos::{IdentityCache, ImportJobRepo, TranslationRepo};
use textdb_lib::{ImportJobManager, Importer, Settings, TextDb};

#[derive(Parser)]
#[command(name = "textdb", version, about = "XLIFF translation import pipeline")]
struct Cli {
    /// 覆盖配置中的数据库路径
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 导入单个 XLIFF 文件
    Import {
        file: PathBuf,
        /// 覆盖已有翻译值
        #[arg(long)]
        force: bool,
    },
    /// 导入目录下全部 XLIFF 文件（按语言升序）
    ImportDir {
        dir: PathBuf,
        #[arg(long)]
        force: bool,
    },
    /// 查询翻译值
    Translate {
        /// 复合键：component|type|placeholder
        key: String,
        /// 语言代码（默认 default）
        #[arg(long, default_value = "default")]
        language: String,
    },
    /// 导入任务管理
    #[command(subcommand)]
    Job(JobCommand),
}

#[derive(Subcommand)]
enum JobCommand {
    /// 登记导入任务
    Enqueue {
        file: PathBuf,
        #[arg(long)]
        force: bool,
    },
    /// 执行任务
    Run { job_id: String },
    /// 查看任务状态
    Status { job_id: String },
    /// 清理早于给定天数的终态任务
    Cleanup {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load configuration")?;
    let db_path = cli
        .database
        .unwrap_or_else(|| settings.database_path.clone());
    let db = TextDb::new(&db_path).context("failed to open database")?;

    match cli.command {
        Command::Import { file, force } => {
            let importer = Importer::new(&db, &settings);
            let outcome = importer.import_file(&file, force)?;
            report_outcome(&outcome);
        }
        Command::ImportDir { dir, force } => {
            let importer = Importer::new(&db, &settings);
            let outcome = importer.import_directory(&dir, force)?;
            report_outcome(&outcome);
        }
        Command::Translate { key, language } => {
            let parsed = textdb_lib::key::TranslationKey::parse(&key)?;
            let language_id = settings.language_id(&language);

            let conn = db.get_conn()?;
            let mut cache = IdentityCache::new();
            let entry = TranslationRepo::find_entry(
                &conn,
                &mut cache,
                settings.pid,
                &settings.environment,
                &parsed.component,
                &parsed.type_name,
                &parsed.placeholder,
                language_id,
                settings.create_if_missing,
            )?;

            match entry {
                Some(translation) => println!("{}", translation.value),
                // 查无记录：按约定回显占位符本身
                None => println!("{}", parsed.placeholder),
            }
        }
        Command::Job(job_command) => match job_command {
            JobCommand::Enqueue { file, force } => {
                let job = ImportJobManager::enqueue(&db, &file, force)?;
                println!("{}", job.job_id);
            }
            JobCommand::Run { job_id } => {
                ImportJobManager::process(&db, &settings, &job_id)?;
                print_job_status(&db, &job_id)?;
            }
            JobCommand::Status { job_id } => {
                print_job_status(&db, &job_id)?;
            }
            JobCommand::Cleanup { days } => {
                let deleted = ImportJobManager::cleanup_finished(&db, days)?;
                info!("Removed {} finished jobs", deleted);
            }
        },
    }

    Ok(())
}

fn report_outcome(outcome: &textdb_lib::ImportOutcome) {
    println!(
        "imported: {}, updated: {}, errors: {}",
        outcome.imported,
        outcome.updated,
        outcome.errors.len()
    );
    for error in &outcome.errors {
        eprintln!("  {}", error);
    }
}

fn print_job_status(db: &TextDb, job_id: &str) -> anyhow::Result<()> {
    let conn = db.get_conn()?;
    let job = ImportJobRepo::find_by_job_id(&conn, job_id)?
        .with_context(|| format!("job {} not found", job_id))?;

    println!(
        "job {}: {} (imported: {}, updated: {})",
        job.job_id,
        job.status.as_str(),
        job.imported,
        job.updated
    );
    if let Some(message) = &job.error_message {
        println!("  errors: {}", message);
    }
    Ok(())
}
