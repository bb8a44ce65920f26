//! Domain entities shared by every crate in the workspace.
//!
//! The serialized shape (camelCase keys, kebab-case task kinds) is the
//! persisted format, so renames here are storage migrations.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Wall-clock time
// ============================================================================

/// Local wall-clock time of day ("HH:MM"), no timezone attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTime(NaiveTime);

impl WallTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }

    /// Whether `self` falls inside the half-open window `[from, until)`.
    ///
    /// A window whose end precedes its start wraps past midnight
    /// (e.g. a night-shift wake of 22:00 and sleep of 06:00).
    /// Equal bounds cover the whole day.
    pub fn within(&self, from: WallTime, until: WallTime) -> bool {
        match from.cmp(&until) {
            std::cmp::Ordering::Less => *self >= from && *self < until,
            std::cmp::Ordering::Greater => *self >= from || *self < until,
            std::cmp::Ordering::Equal => true,
        }
    }
}

impl From<NaiveTime> for WallTime {
    fn from(t: NaiveTime) -> Self {
        Self(NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t))
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for WallTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(WallTime::from)
    }
}

impl Serialize for WallTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WallTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid wall time {:?}: {}", raw, e)))
    }
}

// ============================================================================
// Baseline
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorityPreference {
    #[default]
    Mentor,
    Advisor,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkStyle {
    #[default]
    Deep,
    Collaborative,
    Reactive,
}

/// The onboarding profile. Only explicit user edits or a purge touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBaseline {
    pub name: String,
    pub wake_time: WallTime,
    pub sleep_time: WallTime,
    #[serde(default = "default_energy_peak")]
    pub energy_peak: String,
    pub primary_goal: String,
    pub main_blocker: String,
    #[serde(default)]
    pub work_style: WorkStyle,
    #[serde(default)]
    pub authority_preference: AuthorityPreference,
}

fn default_energy_peak() -> String {
    "morning".to_string()
}

impl Default for UserBaseline {
    fn default() -> Self {
        Self {
            name: String::new(),
            wake_time: WallTime(NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default()),
            sleep_time: WallTime(NaiveTime::from_hms_opt(23, 0, 0).unwrap_or_default()),
            energy_peak: default_energy_peak(),
            primary_goal: String::new(),
            main_blocker: String::new(),
            work_style: WorkStyle::Deep,
            authority_preference: AuthorityPreference::Mentor,
        }
    }
}

// ============================================================================
// Schedule
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    DeepWork,
    Routine,
    Rest,
    Strategic,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::DeepWork => "deep-work",
            TaskKind::Routine => "routine",
            TaskKind::Rest => "rest",
            TaskKind::Strategic => "strategic",
        }
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deep-work" | "deep" => Ok(TaskKind::DeepWork),
            "routine" => Ok(TaskKind::Routine),
            "rest" => Ok(TaskKind::Rest),
            "strategic" => Ok(TaskKind::Strategic),
            other => Err(format!("unknown task type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Fixed,
    Flexible,
    #[default]
    Fluid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    Missed,
    Rescheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: String,
    pub title: String,
    pub start_time: WallTime,
    /// Minutes, always > 0.
    pub duration: u32,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub strictness: Strictness,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScheduledTask {
    /// Minute-of-day at which the task ends. May exceed 1440 for tasks that
    /// run past midnight.
    pub fn end_minute(&self) -> u32 {
        self.start_time.minutes_since_midnight() + self.duration
    }
}

/// Advisory focus window; never enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitivePeak {
    pub start: WallTime,
    pub end: WallTime,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrictionImpact {
    Low,
    #[default]
    Medium,
    High,
}

/// A recorded deviation from a task. `task_id` is a weak reference and may
/// dangle after the task is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrictionLog {
    pub task_id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub reason: String,
    #[serde(default)]
    pub impact: FrictionImpact,
}

/// The single mutable schedule aggregate for one day context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalSchedule {
    pub date: NaiveDate,
    pub tasks: Vec<ScheduledTask>,
    #[serde(default)]
    pub cognitive_peaks: Vec<CognitivePeak>,
    #[serde(default)]
    pub friction_logs: Vec<FrictionLog>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wall_time_parse_and_display() {
        let t: WallTime = "07:05".parse().unwrap();
        assert_eq!(t.to_string(), "07:05");
        assert_eq!(t.minutes_since_midnight(), 425);

        let with_secs: WallTime = "23:59:30".parse().unwrap();
        assert_eq!(with_secs.to_string(), "23:59");
        assert!("25:00".parse::<WallTime>().is_err());
        assert!("soon".parse::<WallTime>().is_err());
    }

    #[test]
    fn test_wall_time_window() {
        let wake = WallTime::from_hm(7, 0).unwrap();
        let sleep = WallTime::from_hm(23, 0).unwrap();
        assert!(WallTime::from_hm(7, 0).unwrap().within(wake, sleep));
        assert!(WallTime::from_hm(22, 59).unwrap().within(wake, sleep));
        assert!(!WallTime::from_hm(23, 0).unwrap().within(wake, sleep));
        assert!(!WallTime::from_hm(6, 59).unwrap().within(wake, sleep));

        // Overnight window
        let night_wake = WallTime::from_hm(22, 0).unwrap();
        let night_sleep = WallTime::from_hm(6, 0).unwrap();
        assert!(WallTime::from_hm(23, 30).unwrap().within(night_wake, night_sleep));
        assert!(WallTime::from_hm(2, 0).unwrap().within(night_wake, night_sleep));
        assert!(!WallTime::from_hm(12, 0).unwrap().within(night_wake, night_sleep));
    }

    #[test]
    fn test_task_serialized_shape() {
        let task = ScheduledTask {
            id: "T1".into(),
            title: "Write".into(),
            start_time: WallTime::from_hm(9, 30).unwrap(),
            duration: 90,
            kind: TaskKind::DeepWork,
            strictness: Strictness::Fixed,
            status: TaskStatus::Pending,
            description: None,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["startTime"], "09:30");
        assert_eq!(json["type"], "deep-work");
        assert_eq!(json["strictness"], "fixed");
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_schedule_without_optional_lists() {
        let json = r#"{"date":"2026-10-16","tasks":[]}"#;
        let schedule: TemporalSchedule = serde_json::from_str(json).unwrap();
        assert!(schedule.friction_logs.is_empty());
        assert!(schedule.cognitive_peaks.is_empty());
        assert_eq!(schedule.date.to_string(), "2026-10-16");
    }

    #[test]
    fn test_baseline_defaults() {
        let b = UserBaseline::default();
        assert_eq!(b.wake_time.to_string(), "07:00");
        assert_eq!(b.sleep_time.to_string(), "23:00");
        assert_eq!(b.authority_preference, AuthorityPreference::Mentor);
    }
}
