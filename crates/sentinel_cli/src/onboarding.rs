//! First-run dossier collection.

use anyhow::Result;
use sentinel_core::{AuthorityPreference, UserBaseline, WallTime, WorkStyle};

/// Ask the onboarding questions through `ask`, which returns `None` when the
/// user aborts (Ctrl-D). Invalid answers are re-asked.
pub fn collect<F>(mut ask: F) -> Result<Option<UserBaseline>>
where
    F: FnMut(&str) -> Result<Option<String>>,
{
    let mut baseline = UserBaseline::default();

    macro_rules! answer {
        ($prompt:expr) => {
            match ask($prompt)? {
                Some(a) => a.trim().to_string(),
                None => return Ok(None),
            }
        };
    }

    baseline.name = loop {
        let name = answer!("Designation (what should I call you)? ");
        if !name.is_empty() {
            break name;
        }
    };
    baseline.primary_goal = loop {
        let goal = answer!("Primary objective? ");
        if !goal.is_empty() {
            break goal;
        }
    };
    baseline.main_blocker = answer!("Main constraint or blocker? ");

    baseline.wake_time = loop {
        let raw = answer!("Wake time [07:00]? ");
        if let Some(t) = time_or(&raw, baseline.wake_time) {
            break t;
        }
        println!("  Use HH:MM, e.g. 06:45");
    };
    baseline.sleep_time = loop {
        let raw = answer!("Sleep time [23:00]? ");
        if let Some(t) = time_or(&raw, baseline.sleep_time) {
            break t;
        }
        println!("  Use HH:MM, e.g. 22:30");
    };

    let peak = answer!("Energy peak (morning/afternoon/evening) [morning]? ");
    if !peak.is_empty() {
        baseline.energy_peak = peak;
    }
    baseline.work_style = loop {
        let raw = answer!("Work style (deep/collaborative/reactive) [deep]? ");
        if let Some(style) = work_style(&raw) {
            break style;
        }
    };
    baseline.authority_preference = loop {
        let raw = answer!("Should I act as your mentor or advisor [mentor]? ");
        if let Some(pref) = authority(&raw) {
            break pref;
        }
    };

    Ok(Some(baseline))
}

fn time_or(raw: &str, default: WallTime) -> Option<WallTime> {
    if raw.is_empty() {
        return Some(default);
    }
    raw.parse().ok()
}

fn work_style(raw: &str) -> Option<WorkStyle> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "deep" => Some(WorkStyle::Deep),
        "collaborative" => Some(WorkStyle::Collaborative),
        "reactive" => Some(WorkStyle::Reactive),
        _ => None,
    }
}

fn authority(raw: &str) -> Option<AuthorityPreference> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "mentor" => Some(AuthorityPreference::Mentor),
        "advisor" => Some(AuthorityPreference::Advisor),
        _ => None,
    }
}
