pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod policy;
pub mod report;
pub mod schedule;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SentinelConfig;
pub use error::SentinelError;
pub use model::{
    AuthorityPreference, CognitivePeak, FrictionImpact, FrictionLog, ScheduledTask, Strictness,
    TaskKind, TaskStatus, TemporalSchedule, UserBaseline, WallTime, WorkStyle,
};
pub use report::{ClinicalKind, ClinicalMarkers, ClinicalReport, RiskLevel, WeeklyReport};
pub use schedule::{TaskDraft, TaskPatch};

/// Generate a fresh opaque identifier for tasks and report artifacts.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
