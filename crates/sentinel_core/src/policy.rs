//! Time-based retention and report cadence arithmetic.

/// Friction logs older than this are pruned at session start (30 days).
pub const FRICTION_MAX_AGE_MS: i64 = 2_592_000_000;

/// Minimum spacing between automatic weekly reports (7 days).
pub const REPORT_INTERVAL_MS: i64 = 604_800_000;

/// A report is due when none was ever generated, or strictly more than
/// `interval_ms` has elapsed since the last one.
pub fn report_due(last_report_ms: Option<i64>, now_ms: i64, interval_ms: i64) -> bool {
    match last_report_ms {
        None => true,
        Some(last) => now_ms.saturating_sub(last) > interval_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_due_without_history() {
        assert!(report_due(None, 0, REPORT_INTERVAL_MS));
    }

    #[test]
    fn test_report_due_boundary_is_exclusive() {
        let last = 1_000;
        assert!(!report_due(Some(last), last + REPORT_INTERVAL_MS, REPORT_INTERVAL_MS));
        assert!(report_due(Some(last), last + REPORT_INTERVAL_MS + 1, REPORT_INTERVAL_MS));
    }

    #[test]
    fn test_clock_skew_never_triggers() {
        // "Last report" in the future (clock moved backwards)
        assert!(!report_due(Some(10_000), 5_000, REPORT_INTERVAL_MS));
    }
}
