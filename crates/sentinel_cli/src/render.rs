//! Plain-text views of session state.

use sentinel_core::{ClinicalReport, TaskStatus, TemporalSchedule, WallTime, WeeklyReport};
use sentinel_reasoning::conversation::{ChatMessage, ChatRole};
use sentinel_reasoning::ReportOutcome;

pub fn message(msg: &ChatMessage) -> Option<String> {
    if msg.text.trim().is_empty() {
        return None;
    }
    let line = match msg.role {
        ChatRole::User => return None,
        ChatRole::Assistant => format!("\nSentinel: {}\n", msg.text),
        ChatRole::System => format!("  [system] {}", msg.text),
        ChatRole::SystemError => format!("  [!] {}", msg.text),
    };
    Some(line)
}

pub fn schedule(schedule: &TemporalSchedule, now: WallTime) -> String {
    if schedule.tasks.is_empty() {
        return format!("Temporal map for {}: empty. Try /generate or /add.", schedule.date);
    }
    let active = schedule.active_task_at(now).map(|t| t.id.as_str());

    let mut out = format!("Temporal map for {}:\n", schedule.date);
    for task in schedule.ordered_tasks() {
        let mark = match task.status {
            TaskStatus::Completed => "[x]",
            TaskStatus::Missed => "[-]",
            TaskStatus::Rescheduled => "[>]",
            TaskStatus::Pending => "[ ]",
        };
        let now_mark = if active == Some(task.id.as_str()) { "*" } else { " " };
        out.push_str(&format!(
            "{} {} {}  {:>4}m  {:<10} {}  ({})\n",
            now_mark,
            mark,
            task.start_time,
            task.duration,
            task.kind.as_str(),
            task.title,
            task.id
        ));
    }
    if !schedule.friction_logs.is_empty() {
        out.push_str(&format!("{} friction log(s) on record\n", schedule.friction_logs.len()));
    }
    out
}

pub fn weekly(report: &WeeklyReport) -> String {
    format!(
        "Weekly report (week of {})\n  Efficiency: {}/100\n  {}\n  Pivot: {}",
        report.week_starting, report.efficiency_score, report.summary, report.pivot_recommendation
    )
}

pub fn clinical(report: &ClinicalReport) -> String {
    let m = &report.clinical_markers;
    format!(
        "Clinical {} report, {}\n  Mood stability: {}/100  Goal alignment: {}/100  Risk: {:?}\n  {}",
        report.kind.label(),
        report.date_generated,
        m.mood_stability,
        m.goal_alignment,
        m.risk_assessment,
        report.content
    )
}

pub fn report_outcome<T>(outcome: &ReportOutcome<T>, show: impl Fn(&T) -> String) -> String {
    match outcome {
        ReportOutcome::Generated(report) => show(report),
        ReportOutcome::NotDue => "Weekly report not due yet.".to_string(),
        ReportOutcome::Skipped(reason) => format!("Report skipped: {}", reason),
        ReportOutcome::Failed(reason) => {
            format!("Report could not be generated ({}). It will be retried later.", reason)
        }
    }
}

pub fn progress(status: &str) -> String {
    format!("  ... {}", status)
}

pub fn status(intensity: f32, cooldown: u64, error: Option<&str>) -> String {
    let mut out = format!("Intensity {:.1}", intensity);
    if cooldown > 0 {
        out.push_str(&format!(" | cooling down {}s", cooldown));
    }
    if let Some(e) = error {
        out.push_str(&format!(" | {}", e));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sentinel_core::{SentinelError, TaskDraft, TaskKind};

    #[test]
    fn test_schedule_marks_active_and_completed() {
        let mut s = TemporalSchedule::new(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap());
        let mut late = TaskDraft::new("Review", WallTime::from_hm(16, 0).unwrap(), 30, TaskKind::Routine);
        late.status = Some(TaskStatus::Completed);
        s.push_task(late);
        s.push_task(TaskDraft::new("Write", WallTime::from_hm(9, 0).unwrap(), 90, TaskKind::DeepWork));

        let text = schedule(&s, WallTime::from_hm(9, 30).unwrap());
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].starts_with("* [ ] 09:00"));
        assert!(lines[1].contains("deep-work"));
        assert!(lines[2].starts_with("  [x] 16:00"));
    }

    #[test]
    fn test_user_and_blank_messages_are_not_echoed() {
        let user = ChatMessage::new(ChatRole::User, "hi", 0);
        let blank = ChatMessage::new(ChatRole::Assistant, "  ", 0);
        let error = ChatMessage::new(ChatRole::SystemError, "Signal lost: timeout", 0);
        assert_eq!(message(&user), None);
        assert_eq!(message(&blank), None);
        assert_eq!(message(&error).as_deref(), Some("  [!] Signal lost: timeout"));
    }

    #[test]
    fn test_progress_and_failed_report() {
        assert_eq!(progress("Processing..."), "  ... Processing...");
        let failed: ReportOutcome<WeeklyReport> =
            ReportOutcome::Failed(SentinelError::MalformedOutput("no JSON object found".into()));
        assert_eq!(
            report_outcome(&failed, weekly),
            "Report could not be generated (malformed structured output: no JSON object found). It will be retried later."
        );
    }

    #[test]
    fn test_status_line() {
        assert_eq!(status(0.8, 0, None), "Intensity 0.8");
        assert_eq!(
            status(0.1, 12, Some("Global Traffic surge. System cooling (15s)...")),
            "Intensity 0.1 | cooling down 12s | Global Traffic surge. System cooling (15s)..."
        );
    }
}
