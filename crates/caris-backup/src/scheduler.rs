//! Cron-driven backup orchestration
//!
//! Owns four independently scheduled jobs: daily incremental, weekly full,
//! monthly full with verification, and daily retention cleanup. Each job
//! runs on its own cron expression (`cron` crate) in its own tokio task.
//! Overlapping fires of the same job are guarded with skip-if-running: a
//! fire that arrives while the previous run is still in flight is skipped
//! and logged rather than stacked.
//!
//! Every run, scheduled or manual, measures wall-clock duration and
//! dispatches one [`RunSummary`] to all notification channels.

use crate::database::{BackupOptions, DatabaseBackupBackend};
use crate::error::{BackupError, BackupResult};
use crate::files::FileBackupBackend;
use crate::metadata::BackupType;
use crate::notify::{AlertDispatcher, ArtifactSummary, RunSummary};
use crate::retention::RetentionPolicy;
use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Job name: daily incremental database backup
pub const JOB_DAILY_INCREMENTAL: &str = "daily-incremental";
/// Job name: weekly full backup of database and files
pub const JOB_WEEKLY_FULL: &str = "weekly-full";
/// Job name: monthly full backup with post-backup verification
pub const JOB_MONTHLY_VERIFIED: &str = "monthly-verified";
/// Job name: daily retention cleanup
pub const JOB_DAILY_CLEANUP: &str = "daily-cleanup";

/// Cron expressions for the four scheduled jobs
///
/// Expressions use the six-field `sec min hour dom month dow` format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Daily incremental database backup
    pub daily_incremental: String,
    /// Weekly full backup of database and files
    pub weekly_full: String,
    /// Monthly full backup plus verification
    pub monthly_verified: String,
    /// Daily retention cleanup
    pub daily_cleanup: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_incremental: "0 0 2 * * *".into(),
            weekly_full: "0 0 3 * * Sun".into(),
            monthly_verified: "0 0 4 1 * *".into(),
            daily_cleanup: "0 30 5 * * *".into(),
        }
    }
}

/// Scheduled job kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    DailyIncremental,
    WeeklyFull,
    MonthlyVerified,
    DailyCleanup,
    Manual(BackupType),
}

impl JobKind {
    fn job_name(&self) -> String {
        match self {
            JobKind::DailyIncremental => JOB_DAILY_INCREMENTAL.into(),
            JobKind::WeeklyFull => JOB_WEEKLY_FULL.into(),
            JobKind::MonthlyVerified => JOB_MONTHLY_VERIFIED.into(),
            JobKind::DailyCleanup => JOB_DAILY_CLEANUP.into(),
            JobKind::Manual(BackupType::Full) => "manual-full".into(),
            JobKind::Manual(BackupType::Incremental) => "manual-incremental".into(),
        }
    }
}

/// Everything a job run needs, shared across spawned tasks
struct JobContext {
    database: Arc<DatabaseBackupBackend>,
    files: Arc<FileBackupBackend>,
    retention: RetentionPolicy,
    notifier: Arc<AlertDispatcher>,
    options: BackupOptions,
}

struct ScheduledJob {
    name: &'static str,
    kind: JobKind,
    schedule: CronSchedule,
    in_flight: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

/// Status snapshot of the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    /// Whether the scheduler is currently running
    pub running: bool,
    /// Per-job status
    pub jobs: Vec<JobStatus>,
}

/// Status of one scheduled job
#[derive(Debug, Clone)]
pub struct JobStatus {
    /// Job name
    pub name: String,
    /// Computed next fire time
    pub next_fire: Option<DateTime<Utc>>,
    /// Whether a run is currently in flight
    pub in_flight: bool,
}

/// Cron-driven orchestrator over the two backup backends
pub struct BackupScheduler {
    ctx: Arc<JobContext>,
    jobs: Mutex<Vec<ScheduledJob>>,
    running: AtomicBool,
}

impl BackupScheduler {
    /// Create a scheduler; cron expressions are validated eagerly
    pub fn new(
        database: Arc<DatabaseBackupBackend>,
        files: Arc<FileBackupBackend>,
        retention: RetentionPolicy,
        notifier: Arc<AlertDispatcher>,
        options: BackupOptions,
        schedules: &ScheduleConfig,
    ) -> BackupResult<Self> {
        let parse = |name: &str, expr: &str| {
            CronSchedule::from_str(expr).map_err(|e| {
                BackupError::config(format!("invalid cron expression for {}: {}", name, e))
            })
        };

        let jobs = vec![
            ScheduledJob {
                name: JOB_DAILY_INCREMENTAL,
                kind: JobKind::DailyIncremental,
                schedule: parse(JOB_DAILY_INCREMENTAL, &schedules.daily_incremental)?,
                in_flight: Arc::new(AtomicBool::new(false)),
                task: None,
            },
            ScheduledJob {
                name: JOB_WEEKLY_FULL,
                kind: JobKind::WeeklyFull,
                schedule: parse(JOB_WEEKLY_FULL, &schedules.weekly_full)?,
                in_flight: Arc::new(AtomicBool::new(false)),
                task: None,
            },
            ScheduledJob {
                name: JOB_MONTHLY_VERIFIED,
                kind: JobKind::MonthlyVerified,
                schedule: parse(JOB_MONTHLY_VERIFIED, &schedules.monthly_verified)?,
                in_flight: Arc::new(AtomicBool::new(false)),
                task: None,
            },
            ScheduledJob {
                name: JOB_DAILY_CLEANUP,
                kind: JobKind::DailyCleanup,
                schedule: parse(JOB_DAILY_CLEANUP, &schedules.daily_cleanup)?,
                in_flight: Arc::new(AtomicBool::new(false)),
                task: None,
            },
        ];

        Ok(Self {
            ctx: Arc::new(JobContext {
                database,
                files,
                retention,
                notifier,
                options,
            }),
            jobs: Mutex::new(jobs),
            running: AtomicBool::new(false),
        })
    }

    /// Start all scheduled jobs; a no-op when already running
    #[instrument(skip(self))]
    pub fn start(&self) -> BackupResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("⏰ Backup scheduler already running");
            return Ok(());
        }

        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| BackupError::other("scheduler state poisoned"))?;
        for job in jobs.iter_mut() {
            let ctx = self.ctx.clone();
            let schedule = job.schedule.clone();
            let kind = job.kind;
            let name = job.name;
            let in_flight = job.in_flight.clone();
            job.task = Some(tokio::spawn(async move {
                job_loop(ctx, name, kind, schedule, in_flight).await;
            }));
        }

        info!("⏰ Backup scheduler started with {} jobs", jobs.len());
        Ok(())
    }

    /// Cancel all scheduled jobs and clear internal state
    ///
    /// Stopping only prevents future fires; runs already in flight are not
    /// cancelled mid-operation.
    #[instrument(skip(self))]
    pub fn stop(&self) -> BackupResult<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut jobs = self
            .jobs
            .lock()
            .map_err(|_| BackupError::other("scheduler state poisoned"))?;
        for job in jobs.iter_mut() {
            if let Some(task) = job.task.take() {
                task.abort();
            }
        }

        info!("🛑 Backup scheduler stopped");
        Ok(())
    }

    /// Run an on-demand backup outside the schedule, with the same timing
    /// and notification behavior as a scheduled run
    #[instrument(skip(self))]
    pub async fn run_manual_backup(&self, backup_type: BackupType) -> BackupResult<RunSummary> {
        Ok(execute_job(&self.ctx, JobKind::Manual(backup_type)).await)
    }

    /// Running flag, active job names, and each job's next fire time
    pub fn get_status(&self) -> SchedulerStatus {
        let running = self.running.load(Ordering::SeqCst);
        let jobs = match self.jobs.lock() {
            Ok(jobs) => jobs
                .iter()
                .map(|job| JobStatus {
                    name: job.name.to_string(),
                    next_fire: job.schedule.upcoming(Utc).next(),
                    in_flight: job.in_flight.load(Ordering::SeqCst),
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        SchedulerStatus { running, jobs }
    }

    /// Next fire time of one job by name
    pub fn next_fire_time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.jobs
            .lock()
            .ok()?
            .iter()
            .find(|job| job.name == name)
            .and_then(|job| job.schedule.upcoming(Utc).next())
    }
}

/// Sleep-until-fire loop for one job
async fn job_loop(
    ctx: Arc<JobContext>,
    name: &'static str,
    kind: JobKind,
    schedule: CronSchedule,
    in_flight: Arc<AtomicBool>,
) {
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            warn!("Job {} has no future fire times, exiting loop", name);
            break;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        if in_flight.swap(true, Ordering::SeqCst) {
            warn!("⏭ Skipping {} fire: previous run still in progress", name);
            continue;
        }

        let ctx = ctx.clone();
        let flag = in_flight.clone();
        tokio::spawn(async move {
            execute_job(&ctx, kind).await;
            flag.store(false, Ordering::SeqCst);
        });
    }
}

/// Run one job end to end and notify both channels
async fn execute_job(ctx: &JobContext, kind: JobKind) -> RunSummary {
    let job = kind.job_name();
    let started = std::time::Instant::now();
    info!("⏰ Running backup job {}", job);

    let mut artifacts: Vec<ArtifactSummary> = Vec::new();
    let mut error: Option<String> = None;

    match kind {
        JobKind::DailyIncremental | JobKind::Manual(BackupType::Incremental) => {
            match ctx.database.create_incremental_backup(ctx.options).await {
                Ok(meta) => artifacts.push((&meta).into()),
                Err(e) => error = Some(e.to_string()),
            }
        }
        JobKind::WeeklyFull | JobKind::Manual(BackupType::Full) => {
            run_full_pair(ctx, &mut artifacts, &mut error, false).await;
        }
        JobKind::MonthlyVerified => {
            run_full_pair(ctx, &mut artifacts, &mut error, true).await;
        }
        JobKind::DailyCleanup => {
            let db_pruned = ctx.database.apply_retention_policy(&ctx.retention);
            let files_pruned = ctx.files.apply_retention_policy(&ctx.retention);
            match (db_pruned, files_pruned) {
                (Ok(db), Ok(files)) => {
                    info!("🗑 Cleanup pruned {} database and {} file backup(s)", db, files)
                }
                (db, files) => {
                    let mut messages = Vec::new();
                    if let Err(e) = db {
                        messages.push(format!("database cleanup: {}", e));
                    }
                    if let Err(e) = files {
                        messages.push(format!("file cleanup: {}", e));
                    }
                    error = Some(messages.join("; "));
                }
            }
        }
    }

    let summary = RunSummary {
        job: job.clone(),
        success: error.is_none(),
        duration: started.elapsed(),
        finished_at: Utc::now(),
        artifacts,
        error,
    };

    if summary.success {
        info!("✅ Job {} finished in {:?}", job, summary.duration);
    } else {
        warn!("❌ Job {} failed after {:?}", job, summary.duration);
    }

    ctx.notifier.dispatch(&summary).await;
    summary
}

/// Full database backup plus full file backup, optionally verified
async fn run_full_pair(
    ctx: &JobContext,
    artifacts: &mut Vec<ArtifactSummary>,
    error: &mut Option<String>,
    verify: bool,
) {
    let mut failures = Vec::new();

    match ctx.database.create_full_backup(ctx.options).await {
        Ok(meta) => {
            if verify {
                match ctx.database.verify_backup(&meta.id) {
                    Ok(true) => {}
                    Ok(false) => failures.push(format!("verification failed for {}", meta.id)),
                    Err(e) => failures.push(format!("verification of {}: {}", meta.id, e)),
                }
            }
            match ctx.database.store().load(&meta.id) {
                Ok(refreshed) => artifacts.push((&refreshed).into()),
                Err(_) => artifacts.push((&meta).into()),
            }
        }
        Err(e) => failures.push(format!("database backup: {}", e)),
    }

    match ctx.files.create_full_backup(ctx.options.encrypt).await {
        Ok(meta) => {
            if verify {
                match ctx.files.verify_backup(&meta.id) {
                    Ok(true) => {}
                    Ok(false) => failures.push(format!("verification failed for {}", meta.id)),
                    Err(e) => failures.push(format!("verification of {}: {}", meta.id, e)),
                }
            }
            match ctx.files.store().load(&meta.id) {
                Ok(refreshed) => artifacts.push((&refreshed).into()),
                Err(_) => artifacts.push((&meta).into()),
            }
        }
        Err(e) => failures.push(format!("file backup: {}", e)),
    }

    if !failures.is_empty() {
        *error = Some(failures.join("; "));
    }
}
