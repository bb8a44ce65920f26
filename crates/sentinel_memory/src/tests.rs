use crate::{apply_retention, keys, KvStore, MemoryStore, Records, SqliteStore};
use chrono::NaiveDate;
use sentinel_core::policy::FRICTION_MAX_AGE_MS;
use sentinel_core::{
    ClinicalKind, ClinicalMarkers, ClinicalReport, RiskLevel, TaskDraft, TaskKind,
    TemporalSchedule, UserBaseline, WallTime, WeeklyReport,
};
use std::sync::Arc;

const NOW: i64 = 1_792_143_000_000;
const DAY: i64 = 86_400_000;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn schedule_with_friction(ages_days: &[i64]) -> TemporalSchedule {
    let mut s = TemporalSchedule::new(date());
    let mut draft = TaskDraft::new("Write", WallTime::from_hm(9, 0).unwrap(), 60, TaskKind::DeepWork);
    draft.id = Some("T1".into());
    s.push_task(draft);
    for age in ages_days {
        s.record_friction("T1", &format!("{} days ago", age), NOW - age * DAY);
    }
    s
}

fn weekly(id: &str) -> WeeklyReport {
    WeeklyReport {
        id: id.into(),
        week_starting: date(),
        summary: "steady".into(),
        pivot_recommendation: "protect mornings".into(),
        efficiency_score: 72,
        created_at: NOW,
    }
}

fn clinical(id: &str) -> ClinicalReport {
    ClinicalReport {
        id: id.into(),
        kind: ClinicalKind::Weekly,
        created_at: NOW,
        date_generated: date(),
        content: "stable".into(),
        clinical_markers: ClinicalMarkers {
            mood_stability: 60,
            goal_alignment: 70,
            risk_assessment: RiskLevel::Low,
        },
    }
}

#[tokio::test]
async fn test_typed_roundtrips() {
    let records = Records::new(Arc::new(MemoryStore::new()));
    assert!(records.load_baseline().await.unwrap().is_none());
    assert!(records.load_schedule().await.unwrap().is_none());
    assert!(records.clinical_history().await.unwrap().is_empty());

    let baseline = UserBaseline {
        name: "Ada".into(),
        primary_goal: "Ship the compiler".into(),
        main_blocker: "Meetings".into(),
        ..UserBaseline::default()
    };
    records.save_baseline(&baseline).await.unwrap();
    assert_eq!(records.load_baseline().await.unwrap(), Some(baseline));

    let schedule = schedule_with_friction(&[1]);
    records.save_schedule(&schedule).await.unwrap();
    assert_eq!(records.load_schedule().await.unwrap(), Some(schedule));
}

#[tokio::test]
async fn test_clinical_history_is_append_only() {
    let records = Records::new(Arc::new(MemoryStore::new()));
    records.append_clinical_report(&clinical("c1")).await.unwrap();
    records.append_clinical_report(&clinical("c2")).await.unwrap();
    let ids: Vec<String> = records
        .clinical_history()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["c1", "c2"]);
}

#[tokio::test]
async fn test_weekly_report_is_single_latest_value() {
    let records = Records::new(Arc::new(MemoryStore::new()));
    records.save_weekly_report(&weekly("w1")).await.unwrap();
    records.save_weekly_report(&weekly("w2")).await.unwrap();
    assert_eq!(records.load_weekly_report().await.unwrap().unwrap().id, "w2");
}

#[tokio::test]
async fn test_last_report_time_garbage_reads_as_absent() {
    let store = Arc::new(MemoryStore::new());
    let records = Records::new(store.clone());
    store.set(keys::LAST_REPORT_TIME, "yesterday").await.unwrap();
    assert_eq!(records.last_report_time().await.unwrap(), None);

    records.set_last_report_time(NOW).await.unwrap();
    assert_eq!(records.last_report_time().await.unwrap(), Some(NOW));
}

#[tokio::test]
async fn test_retention_prunes_and_persists() {
    let store = Arc::new(MemoryStore::new());
    let records = Records::new(store.clone());
    records
        .save_schedule(&schedule_with_friction(&[1, 29, 31, 45]))
        .await
        .unwrap();
    let writes_before = store.write_count();

    let report = apply_retention(&records, NOW, FRICTION_MAX_AGE_MS).await.unwrap();
    assert_eq!(report.removed, 2);
    assert_eq!(store.write_count(), writes_before + 1);

    let persisted = records.load_schedule().await.unwrap().unwrap();
    let reasons: Vec<&str> = persisted.friction_logs.iter().map(|l| l.reason.as_str()).collect();
    assert_eq!(reasons, vec!["1 days ago", "29 days ago"]);
    assert_eq!(Some(persisted), report.schedule);
}

#[tokio::test]
async fn test_retention_without_stale_logs_does_not_write() {
    let store = Arc::new(MemoryStore::new());
    let records = Records::new(store.clone());
    let original = schedule_with_friction(&[0, 30]);
    records.save_schedule(&original).await.unwrap();
    let writes_before = store.write_count();

    let report = apply_retention(&records, NOW, FRICTION_MAX_AGE_MS).await.unwrap();
    assert_eq!(report.removed, 0);
    assert_eq!(store.write_count(), writes_before, "no spurious write");
    assert_eq!(records.load_schedule().await.unwrap(), Some(original));
}

#[tokio::test]
async fn test_retention_spares_reports() {
    let records = Records::new(Arc::new(MemoryStore::new()));
    records.save_schedule(&schedule_with_friction(&[90])).await.unwrap();
    let mut old = clinical("ancient");
    old.created_at = NOW - 365 * DAY;
    records.append_clinical_report(&old).await.unwrap();
    records.save_weekly_report(&weekly("w-old")).await.unwrap();

    apply_retention(&records, NOW, FRICTION_MAX_AGE_MS).await.unwrap();

    assert_eq!(records.clinical_history().await.unwrap().len(), 1);
    assert!(records.load_weekly_report().await.unwrap().is_some());
}

#[tokio::test]
async fn test_retention_without_schedule() {
    let records = Records::new(Arc::new(MemoryStore::new()));
    let report = apply_retention(&records, NOW, FRICTION_MAX_AGE_MS).await.unwrap();
    assert_eq!(report.schedule, None);
    assert_eq!(report.removed, 0);
}

#[tokio::test]
async fn test_purge_is_total() {
    for store in [
        Arc::new(MemoryStore::new()) as Arc<dyn KvStore>,
        Arc::new(SqliteStore::new(":memory:").await.unwrap()) as Arc<dyn KvStore>,
    ] {
        let records = Records::new(store.clone());
        records.save_baseline(&UserBaseline::default()).await.unwrap();
        records.save_schedule(&schedule_with_friction(&[1])).await.unwrap();
        records.save_weekly_report(&weekly("w1")).await.unwrap();
        records.append_clinical_report(&clinical("c1")).await.unwrap();
        records.set_last_report_time(NOW).await.unwrap();

        records.purge().await.unwrap();

        for key in keys::ALL {
            assert_eq!(store.get(key).await.unwrap(), None, "{} survived purge", key);
        }
    }
}
