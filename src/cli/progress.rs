// src/cli/progress.rs — Terminal progress renderer for experiment runs

use crate::core::types::{ProgressEvent, Stage};

/// Build a progress callback that writes formatted output to stderr.
///
/// All progress output goes to stderr so stdout stays clean for the final
/// table. In demo mode retrieved passages, hints and generated code are
/// echoed as well.
pub fn terminal_progress(demo: bool) -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| {
        if let Some(line) = format_event(&event, demo) {
            eprintln!("{}", line);
        }
    }
}

/// One rendered line (or block) per event; `None` for events hidden outside demo mode.
pub fn format_event(event: &ProgressEvent, demo: bool) -> Option<String> {
    let line = match event {
        ProgressEvent::ProblemStart { problem } => format!("[{}] start", problem),
        ProgressEvent::ProblemSkipped { problem, outcome } => {
            format!("[{}] already evaluated: {}", problem, outcome)
        }
        ProgressEvent::AttemptStart {
            problem,
            stage,
            index,
            max_attempts,
        } => match stage {
            Stage::Initial => format!("[{}] initial attempt (1/{})", problem, max_attempts),
            Stage::Correction => format!(
                "[{}] correction {:02} ({}/{})",
                problem,
                index,
                index + 1,
                max_attempts
            ),
        },
        ProgressEvent::Retrieved { passage } if demo => block("retrieved passage", passage),
        ProgressEvent::Hint { hint } if demo => block("hint", hint),
        ProgressEvent::Generated { code } if demo => block("generated code", code),
        ProgressEvent::Retrieved { .. } | ProgressEvent::Hint { .. } | ProgressEvent::Generated { .. } => {
            return None;
        }
        ProgressEvent::AttemptEnd { problem, verdict, .. } => {
            format!("[{}]   -> {}", problem, verdict)
        }
        ProgressEvent::ProblemEnd {
            problem,
            outcome,
            termination,
            attempts,
        } => format!(
            "[{}] {} ({}, {} attempt(s))",
            problem, outcome, termination, attempts
        ),
    };
    Some(line)
}

fn block(title: &str, body: &str) -> String {
    let body = if body.trim().is_empty() { "(empty)" } else { body.trim_end() };
    format!("──── {} ────\n{}", title, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Outcome, ProblemId, Termination};

    fn id() -> ProblemId {
        ProblemId::new("Numpy", 7)
    }

    #[test]
    fn test_attempt_lines() {
        let initial = ProgressEvent::AttemptStart {
            problem: id(),
            stage: Stage::Initial,
            index: 0,
            max_attempts: 5,
        };
        assert_eq!(
            format_event(&initial, false).unwrap(),
            "[Numpy_007] initial attempt (1/5)"
        );

        let correction = ProgressEvent::AttemptStart {
            problem: id(),
            stage: Stage::Correction,
            index: 2,
            max_attempts: 5,
        };
        assert_eq!(
            format_event(&correction, false).unwrap(),
            "[Numpy_007] correction 02 (3/5)"
        );
    }

    #[test]
    fn test_problem_end_line() {
        let event = ProgressEvent::ProblemEnd {
            problem: id(),
            outcome: Outcome::Incorrect,
            termination: Termination::ExhaustedAttempts,
            attempts: 5,
        };
        assert_eq!(
            format_event(&event, false).unwrap(),
            "[Numpy_007] Incorrect (exhausted-attempts, 5 attempt(s))"
        );
    }

    #[test]
    fn test_skipped_line() {
        let event = ProgressEvent::ProblemSkipped {
            problem: id(),
            outcome: Outcome::Correct,
        };
        assert_eq!(
            format_event(&event, false).unwrap(),
            "[Numpy_007] already evaluated: Correct"
        );
    }

    #[test]
    fn test_demo_only_events() {
        let hint = ProgressEvent::Hint {
            hint: "1. First, reshape.\n".into(),
        };
        assert_eq!(format_event(&hint, false), None);
        assert_eq!(
            format_event(&hint, true).unwrap(),
            "──── hint ────\n1. First, reshape."
        );

        let empty = ProgressEvent::Retrieved { passage: "".into() };
        assert!(format_event(&empty, true).unwrap().ends_with("(empty)"));
    }
}
