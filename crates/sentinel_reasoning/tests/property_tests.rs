//! Property-based tests for structured-output extraction and the sync trigger.

use proptest::prelude::*;
use sentinel_reasoning::api_types::Role;
use sentinel_reasoning::conversation::{context_window, ChatMessage, ChatRole};
use sentinel_reasoning::decode::{decode_tasks, DecodeError};
use sentinel_reasoning::sync::is_schedule_relevant;

fn task_json(i: usize, hour: u32, minute: u32, duration: u32) -> String {
    format!(
        r#"{{"id":"p{}","title":"Task [{}]","startTime":"{:02}:{:02}","duration":{},"type":"routine"}}"#,
        i, i, hour, minute, duration
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A valid array survives arbitrary bracket-free prose on either side.
    #[test]
    fn array_in_prose_decodes(
        before in "[a-zA-Z ,.:!?]{0,80}",
        after in "[a-zA-Z ,.:!?]{0,80}",
        slots in prop::collection::vec((0u32..24, 0u32..60, 1u32..240), 1..8),
    ) {
        let body: Vec<String> = slots
            .iter()
            .enumerate()
            .map(|(i, (h, m, d))| task_json(i, *h, *m, *d))
            .collect();
        let text = format!("{}[{}]{}", before, body.join(","), after);

        let tasks = decode_tasks(&text).unwrap();
        prop_assert_eq!(tasks.len(), slots.len());
        for (task, (_, _, d)) in tasks.iter().zip(&slots) {
            prop_assert_eq!(task.duration, *d);
        }
    }

    /// Decoding never panics, whatever the model sends.
    #[test]
    fn decode_tolerates_arbitrary_text(text in "\\PC{0,300}") {
        let _ = decode_tasks(&text);
    }

    /// Text without brackets never yields tasks.
    #[test]
    fn bracket_free_text_is_not_found(text in "[^\\[\\]]{0,200}") {
        prop_assume!(!text.contains("NO_CHANGE"));
        prop_assert_eq!(decode_tasks(&text), Err(DecodeError::NotFound("array")));
    }

    /// The trigger is a case-insensitive substring check.
    #[test]
    fn trigger_ignores_case(
        prefix in "[a-z ]{0,20}",
        keyword in prop::sample::select(vec!["schedule", "move", "update", "plan"]),
        upper in any::<bool>(),
    ) {
        let word = if upper { keyword.to_uppercase() } else { keyword.to_string() };
        let reply = format!("{}{} it", prefix, word);
        prop_assert!(is_schedule_relevant(&reply));
    }

    /// The context never carries more turns than the window and always opens
    /// on a user turn.
    #[test]
    fn context_window_is_bounded(len in 0usize..40, window in 0usize..12) {
        let history: Vec<ChatMessage> = (0..len)
            .map(|i| {
                let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
                ChatMessage::new(role, format!("m{}", i), i as i64)
            })
            .collect();
        let turns = context_window(&history, window);
        let tail = len.min(window);
        prop_assert!(turns.len() <= tail);
        prop_assert!(turns.len() + 1 >= tail);
        if let Some(first) = turns.first() {
            prop_assert_eq!(first.role, Role::User);
        }
        if let Some(last) = turns.last() {
            prop_assert_eq!(&last.content, &format!("m{}", len - 1));
        }
    }
}
