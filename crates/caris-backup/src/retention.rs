//! Rotation and retention of backup artifacts
//!
//! Buckets are derived from backup age at evaluation time, never stored:
//! - daily: age of 7 days or less, keep the N most recent
//! - weekly: age 8 to 30 days, one representative per ISO week, keep N weeks
//! - monthly: age 31 to 365 days, one representative per calendar month,
//!   keep N months
//!
//! The representative of a week or month bucket is its oldest backup, so a
//! deliberate first-of-month snapshot survives while later backups in the
//! same bucket are pruned. Everything older or unselected is deleted.
//! Selection is a pure function of the backup set, which makes a repeated
//! run with unchanged inputs a no-op. A backup timestamped after the
//! evaluation time is kept unconditionally.

use crate::error::BackupResult;
use crate::metadata::{BackupMetadata, BackupTarget, MetadataStore};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Keep-counts per retention bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Number of daily backups to keep (age of 7 days or less)
    pub daily: usize,
    /// Number of weekly representatives to keep (age 8 to 30 days)
    pub weekly: usize,
    /// Number of monthly representatives to keep (age 31 to 365 days)
    pub monthly: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            daily: 7,
            weekly: 4,
            monthly: 12,
        }
    }
}

/// Ids of the backups a policy keeps, evaluated at `now`
pub fn select_retained(
    backups: &[BackupMetadata],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> HashSet<String> {
    let mut keep = HashSet::new();

    let age_days = |m: &BackupMetadata| (now - m.timestamp).num_days();

    // A backup dated after `now` (clock skew between hosts) is never pruned
    keep.extend(
        backups
            .iter()
            .filter(|m| age_days(m) < 0)
            .map(|m| m.id.clone()),
    );

    // Daily bucket: most recent N
    let mut daily: Vec<&BackupMetadata> = backups
        .iter()
        .filter(|m| (0..=7).contains(&age_days(m)))
        .collect();
    daily.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    keep.extend(daily.iter().take(policy.daily).map(|m| m.id.clone()));

    // Weekly bucket: oldest backup per ISO week, most recent N weeks
    let mut weeks: HashMap<(i32, u32), &BackupMetadata> = HashMap::new();
    for m in backups.iter().filter(|m| (8..=30).contains(&age_days(m))) {
        let week = m.timestamp.iso_week();
        weeks
            .entry((week.year(), week.week()))
            .and_modify(|rep| {
                if m.timestamp < rep.timestamp {
                    *rep = m;
                }
            })
            .or_insert(m);
    }
    let mut weekly: Vec<&BackupMetadata> = weeks.into_values().collect();
    weekly.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    keep.extend(weekly.iter().take(policy.weekly).map(|m| m.id.clone()));

    // Monthly bucket: oldest backup per calendar month, most recent N months
    let mut months: HashMap<(i32, u32), &BackupMetadata> = HashMap::new();
    for m in backups.iter().filter(|m| (31..=365).contains(&age_days(m))) {
        months
            .entry((m.timestamp.year(), m.timestamp.month()))
            .and_modify(|rep| {
                if m.timestamp < rep.timestamp {
                    *rep = m;
                }
            })
            .or_insert(m);
    }
    let mut monthly: Vec<&BackupMetadata> = months.into_values().collect();
    monthly.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    keep.extend(monthly.iter().take(policy.monthly).map(|m| m.id.clone()));

    keep
}

/// Apply a retention policy to one backup target, deleting everything the
/// policy does not select. Returns the number of deleted backups.
pub fn apply_policy(
    store: &MetadataStore,
    target: BackupTarget,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> BackupResult<usize> {
    let backups = store.list_for_target(target)?;
    let keep = select_retained(&backups, policy, now);

    let mut deleted = 0;
    for backup in &backups {
        if !keep.contains(&backup.id) {
            debug!("Retention pruning backup {}", backup.id);
            store.remove(backup)?;
            deleted += 1;
        }
    }

    if deleted > 0 {
        info!(
            "🗑 Retention policy removed {} {:?} backup(s), kept {}",
            deleted,
            target,
            keep.len()
        );
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{generate_backup_id, BackupStatus, BackupType};
    use chrono::Duration;

    fn backup_at(ts: DateTime<Utc>) -> BackupMetadata {
        BackupMetadata {
            id: generate_backup_id(BackupTarget::Database, ts),
            timestamp: ts,
            backup_type: BackupType::Full,
            target: BackupTarget::Database,
            size: 100,
            compressed: true,
            encrypted: true,
            checksum: "deadbeef".into(),
            file_path: std::path::PathBuf::from("/tmp/none"),
            status: BackupStatus::Completed,
            error: None,
        }
    }

    #[test]
    fn test_daily_bucket_keeps_most_recent_n() {
        let now = Utc::now();
        let backups: Vec<_> = (0..10)
            .map(|d| backup_at(now - Duration::days(d)))
            .collect();

        let keep = select_retained(&backups, &RetentionPolicy::default(), now);

        // Ages 0..=7 qualify as daily, the 7 most recent survive
        for (age, backup) in backups.iter().enumerate() {
            let kept = keep.contains(&backup.id);
            assert_eq!(kept, age < 7, "age {} kept={}", age, kept);
        }
    }

    #[test]
    fn test_forty_day_scenario() {
        // Daily backups on days 1..=40 plus a monthly snapshot on day 1,
        // evaluated on day 40 with the default {daily:7, weekly:4,
        // monthly:12} policy. Fixed evaluation date keeps the calendar
        // bucketing deterministic: days 1..=9 all fall in May 2025.
        let now = "2025-06-10T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let day = |n: i64| now - Duration::days(40 - n);

        let mut backups: Vec<_> = (1..=40).map(|n| backup_at(day(n))).collect();
        let monthly_snapshot = backup_at(day(1) - Duration::hours(1));
        backups.push(monthly_snapshot.clone());

        let keep = select_retained(&backups, &RetentionPolicy::default(), now);

        // Days 34..=40 stay intact
        for backup in &backups[33..40] {
            assert!(keep.contains(&backup.id), "recent daily backup pruned");
        }

        // The deliberate day-1 snapshot is the oldest in its calendar month
        // bucket and therefore the representative
        assert!(keep.contains(&monthly_snapshot.id));

        // At most 4 weekly representatives from the 8..=30 day range
        let weekly_kept = backups
            .iter()
            .filter(|b| {
                let age = (now - b.timestamp).num_days();
                (8..=30).contains(&age) && keep.contains(&b.id)
            })
            .count();
        assert!(weekly_kept <= 4, "kept {} weekly representatives", weekly_kept);

        // Nothing between the buckets leaks through: days 2..=9 compete with
        // the day-1 snapshot and lose
        let day2 = &backups[1];
        assert!(!keep.contains(&day2.id));
    }

    #[test]
    fn test_apply_policy_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        let now = Utc::now();

        for d in 0..20 {
            let meta = backup_at(now - Duration::days(d));
            store.save(&meta).unwrap();
        }

        let policy = RetentionPolicy::default();
        let first = apply_policy(&store, BackupTarget::Database, &policy, now).unwrap();
        assert!(first > 0);

        let second = apply_policy(&store, BackupTarget::Database, &policy, now).unwrap();
        assert_eq!(second, 0, "second run must delete nothing further");
    }

    #[test]
    fn test_future_dated_backup_survives_cleanup() {
        // A host with a skewed clock can write a record dated after the
        // cleanup's evaluation time; it must not be treated as prunable
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::open(dir.path()).unwrap();
        let now = Utc::now();

        let future = backup_at(now + Duration::days(2));
        store.save(&future).unwrap();

        let deleted =
            apply_policy(&store, BackupTarget::Database, &RetentionPolicy::default(), now).unwrap();
        assert_eq!(deleted, 0);
        assert!(store.load(&future.id).is_ok());
    }

    #[test]
    fn test_backups_older_than_a_year_are_pruned() {
        let now = Utc::now();
        let ancient = backup_at(now - Duration::days(400));
        let keep = select_retained(
            std::slice::from_ref(&ancient),
            &RetentionPolicy::default(),
            now,
        );
        assert!(keep.is_empty());
    }
}
