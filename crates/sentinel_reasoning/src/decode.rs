//! Best-effort structured decode of model output.
//!
//! Model text is untrusted: it may wrap JSON in prose or code fences, return
//! the `NO_CHANGE` sentinel, or return nothing usable. Every path ends in a
//! typed result; callers decide whether a failure is silent.

use sentinel_core::{ScheduledTask, TaskDraft};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use thiserror::Error;

pub const NO_CHANGE: &str = "NO_CHANGE";

/// Upper bound on opening brackets probed per input.
const MAX_CANDIDATES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("model reported no change")]
    NoChange,
    #[error("no JSON {0} found in model output")]
    NotFound(&'static str),
    #[error("model output has the wrong shape: {0}")]
    Invalid(String),
}

/// Extract the first `[...]` span that deserialises as `T`.
pub fn extract_json_array<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    if text.contains(NO_CHANGE) {
        return Err(DecodeError::NoChange);
    }
    extract_delimited(text, '[', ']', "array")
}

/// Extract the first `{...}` span that deserialises as `T`.
pub fn extract_json_object<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    extract_delimited(text, '{', '}', "object")
}

fn extract_delimited<T: DeserializeOwned>(
    text: &str,
    open: char,
    close: char,
    shape: &'static str,
) -> Result<T, DecodeError> {
    let candidates = candidate_spans(text, open, close);
    if candidates.is_empty() {
        return Err(DecodeError::NotFound(shape));
    }

    let mut last_error = String::new();
    for span in candidates {
        match serde_json::from_str::<T>(span) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(DecodeError::Invalid(last_error))
}

/// Greedy first-open..last-close span, then every balanced span left to right.
fn candidate_spans(text: &str, open: char, close: char) -> Vec<&str> {
    let mut spans = Vec::new();

    if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
        if start < end {
            spans.push(&text[start..end + close.len_utf8()]);
        }
    }

    let starts = text
        .char_indices()
        .filter(|(_, ch)| *ch == open)
        .map(|(i, _)| i)
        .take(MAX_CANDIDATES);
    for start in starts {
        if let Some(end) = balanced_end(&text[start..], open, close) {
            let span = &text[start..start + end];
            if !spans.contains(&span) {
                spans.push(span);
            }
        }
    }
    spans
}

/// Byte length of the balanced span starting at `s[0] == open`, skipping
/// brackets inside string literals.
fn balanced_end(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode a task array from model text.
///
/// One invalid entry rejects the whole array. Missing or duplicate ids are
/// replaced with fresh ones.
pub fn decode_tasks(text: &str) -> Result<Vec<ScheduledTask>, DecodeError> {
    let drafts: Vec<TaskDraft> = extract_json_array(text)?;

    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(drafts.len());
    for mut draft in drafts {
        draft.validate().map_err(DecodeError::Invalid)?;
        if let Some(id) = &draft.id {
            if !seen.insert(id.clone()) {
                draft.id = None;
            }
        }
        tasks.push(draft.into_task());
    }
    Ok(tasks)
}
