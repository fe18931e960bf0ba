//! CÁRIS backup daemon
//!
//! Long-running process that owns the backup schedule for one deployment:
//! it wires the PostgreSQL driver, the two backup backends, the recovery
//! service and the notification channels together from configuration, then
//! runs the cron jobs until shutdown. One-shot subcommands expose manual
//! backup, restore, verify and listing for operators.
//!
//! Configuration is read from `caris.toml` plus `CARIS_`-prefixed
//! environment variables; every service object is constructed here and
//! passed down explicitly.

use anyhow::Context;
use caris_backup::config::BackupConfig;
use caris_backup::database::{BackupOptions, DatabaseBackupBackend, PgDriver};
use caris_backup::files::FileBackupBackend;
use caris_backup::metadata::{BackupTarget, BackupType, MetadataStore};
use caris_backup::notify::{AlertDispatcher, EmailNotifier, Notifier, WebhookNotifier};
use caris_backup::recovery::{RecoveryService, RestoreOptions};
use caris_backup::scheduler::BackupScheduler;
use caris_backup::utils::BackupUtils;
use clap::{Parser, Subcommand, ValueEnum};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "caris-backupd",
    version,
    about = "CÁRIS backup and disaster-recovery daemon"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "caris.toml", env = "CARIS_CONFIG")]
    config: std::path::PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until interrupted (the default)
    Run,
    /// Run one on-demand backup and exit
    Backup {
        /// Backup type to create
        #[arg(long, value_enum, default_value_t = BackupKind::Full)]
        backup_type: BackupKind,
    },
    /// Restore a database backup
    Restore {
        /// Backup id to restore from
        backup_id: String,
        /// Validate the artifact without touching the database
        #[arg(long)]
        dry_run: bool,
        /// Restore into this database instead of the configured primary
        #[arg(long)]
        target_database: Option<String>,
    },
    /// Verify a backup artifact against its stored checksum
    Verify {
        /// Backup id to verify
        backup_id: String,
    },
    /// List all known backups
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackupKind {
    Full,
    Incremental,
}

impl From<BackupKind> for BackupType {
    fn from(kind: BackupKind) -> Self {
        match kind {
            BackupKind::Full => BackupType::Full,
            BackupKind::Incremental => BackupType::Incremental,
        }
    }
}

/// Fully wired service objects for one deployment
struct Services {
    database: Arc<DatabaseBackupBackend>,
    files: Arc<FileBackupBackend>,
    recovery: RecoveryService,
    scheduler: BackupScheduler,
}

fn build_services(config: &BackupConfig) -> anyhow::Result<Services> {
    let key = config
        .encryption
        .as_ref()
        .map(|enc| caris_crypto::derive_key(&enc.secret, enc.salt.as_bytes()))
        .transpose()
        .context("deriving backup key")?;

    let store = MetadataStore::open(config.metadata_dir())?;
    let driver = Arc::new(PgDriver::new(
        config.database_url.clone(),
        Duration::from_secs(config.subprocess_timeout_secs),
    ));

    let database = Arc::new(DatabaseBackupBackend::new(
        driver.clone(),
        store.clone(),
        config.database_backup_dir(),
        key.clone(),
    )?);
    let files = Arc::new(FileBackupBackend::new(
        &config.uploads_dir,
        store.clone(),
        config.file_backup_dir(),
        key.clone(),
    )?);
    let recovery = RecoveryService::new(
        driver,
        store,
        key.clone(),
        config.restore_temp_dir(),
        config.database_url.clone(),
        &config.uploads_dir,
    );

    let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
    if let Some(email) = &config.notifications.email {
        channels.push(Box::new(EmailNotifier::new(
            &email.smtp_host,
            &email.from,
            &email.to,
        )?));
    }
    if let Some(webhook) = &config.notifications.webhook {
        channels.push(Box::new(WebhookNotifier::new(&webhook.url)));
    }

    let scheduler = BackupScheduler::new(
        database.clone(),
        files.clone(),
        config.retention,
        Arc::new(AlertDispatcher::new(channels)),
        BackupOptions {
            compress: config.compress,
            encrypt: key.is_some(),
        },
        &config.schedules,
    )?;

    Ok(Services {
        database,
        files,
        recovery,
        scheduler,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config: BackupConfig = Figment::new()
        .merge(Toml::file(&cli.config))
        .merge(Env::prefixed("CARIS_").split("__"))
        .extract()
        .context("loading configuration")?;

    let services = build_services(&config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_daemon(&services).await,
        Command::Backup { backup_type } => {
            let summary = services
                .scheduler
                .run_manual_backup(backup_type.into())
                .await?;
            println!("{}", summary.title());
            println!("{}", summary.body());
            if !summary.success {
                anyhow::bail!("backup failed");
            }
            Ok(())
        }
        Command::Restore {
            backup_id,
            dry_run,
            target_database,
        } => {
            let result = services
                .recovery
                .restore_database(RestoreOptions {
                    backup_id,
                    dry_run,
                    verify: true,
                    target_database,
                    target_dir: None,
                })
                .await?;
            if result.success {
                println!(
                    "Restore of {} finished in {:?} (dry_run={})",
                    result.backup_id, result.duration, result.dry_run
                );
                for warning in &result.warnings {
                    println!("warning: {}", warning);
                }
                Ok(())
            } else {
                anyhow::bail!("restore failed: {}", result.errors.join("; "));
            }
        }
        Command::Verify { backup_id } => {
            let metadata = services.database.store().load(&backup_id)?;
            let ok = match metadata.target {
                BackupTarget::Database => services.database.verify_backup(&backup_id)?,
                BackupTarget::Files => services.files.verify_backup(&backup_id)?,
            };
            if ok {
                println!("Backup {} verified", backup_id);
                Ok(())
            } else {
                anyhow::bail!("backup {} failed verification", backup_id);
            }
        }
        Command::List => {
            for metadata in services.database.store().list()? {
                println!(
                    "{}  {:?}/{:?}  {:?}  {}  {}",
                    metadata.id,
                    metadata.target,
                    metadata.backup_type,
                    metadata.status,
                    BackupUtils::format_size(metadata.size),
                    metadata.timestamp
                );
            }
            Ok(())
        }
    }
}

async fn run_daemon(services: &Services) -> anyhow::Result<()> {
    services.scheduler.start()?;
    for job in services.scheduler.get_status().jobs {
        info!(
            "⏰ Job {} next fires at {}",
            job.name,
            job.next_fire
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".into())
        );
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("🛑 Shutdown signal received");
    services.scheduler.stop()?;
    Ok(())
}
