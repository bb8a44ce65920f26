//! Slash-command parsing for the REPL. Anything not starting with `/` is a
//! dialogue turn.

use sentinel_core::{ClinicalKind, TaskKind, WallTime};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chat(String),
    Help,
    Schedule,
    Generate,
    Add {
        start: WallTime,
        duration: u32,
        kind: TaskKind,
        title: String,
    },
    Move {
        id: String,
        start: WallTime,
    },
    Done(String),
    Delete(String),
    Friction {
        id: String,
        reason: String,
    },
    Report,
    Clinical(ClinicalKind),
    History,
    Key(String),
    Status,
    Purge,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /schedule                          show today's temporal map
  /generate                          synthesize a schedule from your baseline
  /add HH:MM <minutes> <type> <title> add a task (type: deep-work|routine|rest|strategic)
  /move <id> HH:MM                   reschedule a task
  /done <id>                         toggle a task between pending and completed
  /delete <id>                       remove a task
  /friction <id> <reason>            report friction on a task
  /report                            generate the weekly efficiency report now
  /clinical weekly|monthly|gp        generate a clinical report
  /history                           list clinical reports
  /key <api-key>                     hold an API key in memory for this session
  /status                            intensity, cooldown and banners
  /purge                             erase every stored record
  /quit                              exit
Anything else is sent to the Sentinel.";

fn parse_time(raw: Option<&str>) -> Result<WallTime, String> {
    let raw = raw.ok_or("missing time (HH:MM)")?;
    raw.parse()
        .map_err(|_| format!("invalid time '{}', expected HH:MM", raw))
}

fn required<'a>(raw: Option<&'a str>, what: &str) -> Result<&'a str, String> {
    raw.filter(|s| !s.trim().is_empty())
        .map(str::trim)
        .ok_or_else(|| format!("missing {}", what))
}

fn parse_clinical(raw: Option<&str>) -> Result<ClinicalKind, String> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("weekly") => Ok(ClinicalKind::Weekly),
        Some("monthly") => Ok(ClinicalKind::Monthly),
        Some("gp") | Some("gp_summary") => Ok(ClinicalKind::GpSummary),
        Some(other) => Err(format!("unknown clinical report '{}'", other)),
        None => Err("usage: /clinical weekly|monthly|gp".to_string()),
    }
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Chat(line.to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "help" | "h" | "?" => Ok(Command::Help),
        "schedule" | "ls" => Ok(Command::Schedule),
        "generate" | "gen" => Ok(Command::Generate),
        "add" => {
            let mut parts = args.splitn(4, char::is_whitespace);
            let start = parse_time(parts.next())?;
            let duration_raw = required(parts.next(), "duration in minutes")?;
            let duration: u32 = duration_raw
                .parse()
                .map_err(|_| format!("invalid duration '{}'", duration_raw))?;
            if duration == 0 {
                return Err("duration must be at least one minute".to_string());
            }
            let kind: TaskKind = required(parts.next(), "task type")?.parse()?;
            let title = required(parts.next(), "title")?.to_string();
            Ok(Command::Add {
                start,
                duration,
                kind,
                title,
            })
        }
        "move" => {
            let mut parts = args.split_whitespace();
            let id = required(parts.next(), "task id")?.to_string();
            let start = parse_time(parts.next())?;
            Ok(Command::Move { id, start })
        }
        "done" => Ok(Command::Done(required(Some(args), "task id")?.to_string())),
        "delete" | "rm" => Ok(Command::Delete(required(Some(args), "task id")?.to_string())),
        "friction" => {
            let (id, reason) = args
                .split_once(char::is_whitespace)
                .ok_or("usage: /friction <id> <reason>")?;
            Ok(Command::Friction {
                id: id.to_string(),
                reason: required(Some(reason), "reason")?.to_string(),
            })
        }
        "report" => Ok(Command::Report),
        "clinical" => Ok(Command::Clinical(parse_clinical(
            Some(args).filter(|a| !a.is_empty()),
        )?)),
        "history" => Ok(Command::History),
        "key" => Ok(Command::Key(required(Some(args), "API key")?.to_string())),
        "status" => Ok(Command::Status),
        "purge" => Ok(Command::Purge),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command '/{}', try /help", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_chat() {
        assert_eq!(
            parse("  move my run please "),
            Ok(Command::Chat("move my run please".into()))
        );
        assert_eq!(parse(""), Ok(Command::Chat(String::new())));
    }

    #[test]
    fn test_add_task() {
        let cmd = parse("/add 09:30 90 deep-work Write the intro chapter").unwrap();
        assert_eq!(
            cmd,
            Command::Add {
                start: WallTime::from_hm(9, 30).unwrap(),
                duration: 90,
                kind: TaskKind::DeepWork,
                title: "Write the intro chapter".into(),
            }
        );
    }

    #[test]
    fn test_add_rejects_bad_input() {
        assert!(parse("/add 25:00 30 rest Nap").is_err());
        assert!(parse("/add 09:00 0 rest Nap").is_err());
        assert!(parse("/add 09:00 30 nap Nap").is_err());
        assert!(parse("/add 09:00 30 rest").is_err());
    }

    #[test]
    fn test_friction_keeps_full_reason() {
        assert_eq!(
            parse("/friction T1 phone kept buzzing"),
            Ok(Command::Friction {
                id: "T1".into(),
                reason: "phone kept buzzing".into(),
            })
        );
        assert!(parse("/friction T1").is_err());
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("/done T2"), Ok(Command::Done("T2".into())));
        assert_eq!(parse("/rm T2"), Ok(Command::Delete("T2".into())));
        assert_eq!(
            parse("/move T2 14:15"),
            Ok(Command::Move {
                id: "T2".into(),
                start: WallTime::from_hm(14, 15).unwrap(),
            })
        );
        assert_eq!(parse("/clinical gp"), Ok(Command::Clinical(ClinicalKind::GpSummary)));
        assert_eq!(parse("/QUIT"), Ok(Command::Quit));
        assert!(parse("/clinical").is_err());
        assert!(parse("/done").is_err());
        assert!(parse("/teleport").is_err());
    }
}
