use sentinel_core::{
    AuthorityPreference, ClinicalKind, ClinicalReport, FrictionLog, ScheduledTask, UserBaseline,
};

/// System instruction shared by every JSON-producing call.
pub const STRUCTURED_SYSTEM: &str = "You are the planning core of Aura Sentinel, a behavioral \
intelligence assistant. You answer with machine-readable JSON only, never prose.";

pub struct PromptAssembler;

impl PromptAssembler {
    /// Persona and dossier for the dialogue channel.
    pub fn dialogue_system(baseline: Option<&UserBaseline>) -> String {
        let authority = match baseline.map(|b| b.authority_preference) {
            Some(AuthorityPreference::Advisor) => "advisory guide",
            _ => "authoritative mentor",
        };
        let dossier = match baseline {
            Some(b) => format!(
                "USER DOSSIER: Identity: {}, Focus: {}, Constraint: {}.",
                b.name, b.primary_goal, b.main_blocker
            ),
            None => "USER DOSSIER: Initializing.".to_string(),
        };
        format!(
            "You are Aura Sentinel. {}\nPROTOCOL: 1. Act as a {}. \
             2. Challenge the user's blockers aggressively but constructively. \
             3. Ask EXACTLY ONE sharp question. 4. Text only.\n\
             Lines starting with [System] are notices from the scheduler, not the user.",
            dossier, authority
        )
    }

    pub fn onboarding_message(baseline: &UserBaseline) -> String {
        format!(
            "INITIALIZATION SYNC: Designation: {}. Objective: {}. Constraint: {}. \
             I am ready for behavioral analysis.",
            baseline.name, baseline.primary_goal, baseline.main_blocker
        )
    }

    pub fn generation(baseline: &UserBaseline) -> String {
        format!(
            "Generate a fluid 24-hour schedule for {name}.\n\
             Wake: {wake}, Sleep: {sleep}. Energy peak: {peak}.\n\
             Goal: {goal}. Blocker: {blocker}.\n\
             Every task must start at or after {wake} and before {sleep}.\n\
             Use \"fixed\" strictness for critical deep work and \"fluid\" for everything else.\n\
             Output ONLY a JSON array of tasks with this structure:\n\
             [{{\"id\": \"unique-id\", \"title\": \"Task Name\", \"startTime\": \"HH:MM\", \
             \"duration\": 60, \"type\": \"deep-work|routine|rest|strategic\", \
             \"strictness\": \"fixed|flexible|fluid\"}}]",
            name = baseline.name,
            wake = baseline.wake_time,
            sleep = baseline.sleep_time,
            peak = baseline.energy_peak,
            goal = baseline.primary_goal,
            blocker = baseline.main_blocker,
        )
    }

    pub fn sync(tasks: &[ScheduledTask], user_text: &str, reply: &str) -> String {
        format!(
            "Current Schedule: {}\n\
             User said: \"{}\"\n\
             Sentinel said: \"{}\"\n\n\
             Based on this interaction, does the schedule need updating?\n\
             If YES, output ONLY the complete updated JSON array of tasks, keeping existing ids.\n\
             If NO, output \"NO_CHANGE\".\n\
             High-risk tasks (strategic/deep-work) should only be moved if explicitly requested.",
            to_json(tasks),
            user_text,
            reply
        )
    }

    pub fn weekly(
        baseline: &UserBaseline,
        tasks: &[ScheduledTask],
        friction: &[&FrictionLog],
    ) -> String {
        format!(
            "Generate a Weekly Strategic Intelligence Report for {}.\n\
             Goal: {}. Blocker: {}.\n\
             Current Schedule: {}\n\
             Recent Friction: {}\n\
             Output ONLY a JSON object: \
             {{\"summary\": \"...\", \"pivotRecommendation\": \"...\", \"efficiencyScore\": 0-100}}",
            baseline.name,
            baseline.primary_goal,
            baseline.main_blocker,
            to_json(tasks),
            to_json(friction),
        )
    }

    pub fn clinical(
        kind: ClinicalKind,
        baseline: &UserBaseline,
        friction: &[&FrictionLog],
        prior: &[ClinicalReport],
    ) -> String {
        let history = if prior.is_empty() {
            "none".to_string()
        } else {
            prior
                .iter()
                .map(|r| {
                    format!(
                        "- {} ({}): mood {}, alignment {}, risk {:?}. {}",
                        r.date_generated,
                        r.kind.label(),
                        r.clinical_markers.mood_stability,
                        r.clinical_markers.goal_alignment,
                        r.clinical_markers.risk_assessment,
                        r.content
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "Prepare a {} behavioral health report for {}.\n\
             Goal: {}. Blocker: {}. Work style: {:?}.\n\
             Recent Friction: {}\n\
             Prior reports, oldest first:\n{}\n\
             Output ONLY a JSON object: {{\"content\": \"narrative\", \"clinicalMarkers\": \
             {{\"moodStability\": 0-100, \"goalAlignment\": 0-100, \
             \"riskAssessment\": \"low|moderate|high\"}}}}",
            kind.label(),
            baseline.name,
            baseline.primary_goal,
            baseline.main_blocker,
            baseline.work_style,
            to_json(friction),
            history,
        )
    }
}

/// Notice text injected into the dialogue when friction is logged.
pub fn friction_notice(task_title: &str, task_id: &str, reason: &str) -> String {
    format!(
        "SYSTEM LOG: Friction reported on '{}' ({}): {}",
        task_title, task_id, reason
    )
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}
