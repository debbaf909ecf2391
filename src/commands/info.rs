//! Read-only views: help, who

use super::CommandResult;
use crate::server::ServerState;
use crate::session::Session;
use crate::template::{render_who, WhoEntry};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

const RULE: &str = "+----------------------------------------------------------------------------+\n";
const HELP_COLUMNS: usize = 5;

pub fn help(state: &ServerState, session: &Arc<Session>, _arg: &str) -> CommandResult {
    let mut output = String::from("\n");
    output.push_str(RULE);
    output.push_str(
        "   All commands start with a '.'                                                \n",
    );
    output.push_str(RULE);

    let mut count = 0;
    for verb in state.commands.verbs() {
        count += 1;
        let _ = write!(output, "{:>11}", verb);
        if count % HELP_COLUMNS == 0 {
            output.push('\n');
        }
    }
    if count % HELP_COLUMNS != 0 {
        output.push('\n');
    }

    output.push_str(RULE);
    let _ = writeln!(
        output,
        " There is a total of {} commands that you can use",
        count
    );
    output.push_str(RULE);
    session.write(&output);
    CommandResult::Continue
}

/// `who`: everyone logged on, in arrival order
pub fn who(state: &ServerState, session: &Arc<Session>, _arg: &str) -> CommandResult {
    let users: Vec<WhoEntry> = state
        .registry
        .snapshot()
        .iter()
        .map(|s| WhoEntry {
            recap: s.recap(),
            description: s.description(),
            idle: format_idle(s.idle()),
        })
        .collect();

    match render_who(&state.colors, &users) {
        Ok(output) => session.write(&output),
        Err(e) => {
            tracing::warn!("who template failed: {}", e);
            session.write(&format!("template error: {}\n", e));
        }
    }
    CommandResult::Continue
}

/// Whole-second idle time as `1h2m3s`, dropping leading zero units
pub fn format_idle(idle: Duration) -> String {
    let secs = idle.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::dispatch;
    use crate::commands::test_support::Harness;

    #[test]
    fn test_format_idle() {
        assert_eq!(format_idle(Duration::ZERO), "0s");
        assert_eq!(format_idle(Duration::from_millis(5_900)), "5s");
        assert_eq!(format_idle(Duration::from_secs(65)), "1m5s");
        assert_eq!(format_idle(Duration::from_secs(3_603)), "1h0m3s");
    }

    #[test]
    fn test_help_lists_every_verb() {
        let harness = Harness::new();
        let (alice, out) = harness.user("alice");

        dispatch(&harness.state, &alice, ".help");

        let output = out.output();
        assert_eq!(out.write_count(), 1);
        assert!(output.contains("All commands start with a '.'"));
        assert!(output.contains("       desc       help       quit    revtell        say\n"));
        assert!(output.contains("        set       tell      think        who\n"));
        assert!(output.contains("There is a total of 9 commands that you can use"));
    }

    #[test]
    fn test_who_lists_each_user_once() {
        let harness = Harness::new();
        let (alice, out) = harness.user("alice");
        let (_bob, _) = harness.user("bob");

        dispatch(&harness.state, &alice, ".who");

        let output = out.output();
        assert!(output.contains("Total of 2 users"));
        assert_eq!(output.matches("alice is testing.").count(), 1);
        assert_eq!(output.matches("bob is testing.").count(), 1);
        assert!(output.find("alice").unwrap() < output.find("bob").unwrap());
    }

    #[test]
    fn test_who_pads_past_color_markup() {
        let harness = Harness::new();
        let (alice, out) = harness.user("alice");
        alice.set_recap("~FRalice~RS".to_string());
        let (_bob, _) = harness.user("bob");

        dispatch(&harness.state, &alice, ".who");

        let lines: Vec<String> = out
            .output()
            .lines()
            .filter(|line| line.contains("is testing."))
            .map(|line| harness.state.colors.strip(&strip_ansi(line)))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().count(), lines[1].chars().count());
    }

    fn strip_ansi(line: &str) -> String {
        let mut out = String::new();
        let mut chars = line.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}
