//! Line commands for the interactive driver

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use stepwise::{Body, GateHandler, Transition, WizardSnapshot, WizardView};

pub const HELP: &str = "\
Commands:
  next              advance (runs the step gate, if any)
  back              go to the previous step
  goto N            jump to step N (1-based)
  hash VALUE        simulate an external location change
  gate ok           register a gate that passes
  gate fail [MSG]   register a gate that rejects
  gate slow MS      register a gate that passes after MS milliseconds
  status            show the current step
  help              show this help
  quit              exit";

/// Behavior of a gate registered from the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateMode {
    Pass,
    Fail(String),
    Slow(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Back,
    /// Zero-based target (typed 1-based)
    Goto(usize),
    Hash(String),
    Gate(GateMode),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
    #[error("step numbers start at 1")]
    ZeroStep,
}

fn parse_number(value: &str) -> Result<u64, CommandError> {
    value
        .parse()
        .map_err(|_| CommandError::InvalidNumber(value.to_string()))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Empty);
        };
        let rest: Vec<&str> = words.collect();

        match name.to_ascii_lowercase().as_str() {
            "next" | "n" => Ok(Command::Next),
            "back" | "prev" | "b" => Ok(Command::Back),
            "goto" | "g" => {
                let value = rest.first().ok_or(CommandError::MissingArgument("goto"))?;
                match parse_number(value)? {
                    0 => Err(CommandError::ZeroStep),
                    n => Ok(Command::Goto((n - 1) as usize)),
                }
            }
            "hash" => {
                let value = rest.first().ok_or(CommandError::MissingArgument("hash"))?;
                Ok(Command::Hash((*value).to_string()))
            }
            "gate" => match rest.first().copied() {
                Some("ok" | "pass") => Ok(Command::Gate(GateMode::Pass)),
                Some("fail") => {
                    let reason = if rest.len() > 1 {
                        rest[1..].join(" ")
                    } else {
                        "validation failed".to_string()
                    };
                    Ok(Command::Gate(GateMode::Fail(reason)))
                }
                Some("slow") => {
                    let value = rest.get(1).ok_or(CommandError::MissingArgument("gate slow"))?;
                    let millis = parse_number(value)?;
                    Ok(Command::Gate(GateMode::Slow(Duration::from_millis(millis))))
                }
                Some(other) => Err(CommandError::Unknown(format!("gate {other}"))),
                None => Err(CommandError::MissingArgument("gate")),
            },
            "status" | "s" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Gate handler behaving as `mode` every time it runs
pub fn gate_handler(mode: GateMode) -> impl GateHandler {
    move || {
        let mode = mode.clone();
        async move {
            let result: anyhow::Result<()> = match mode {
                GateMode::Pass => Ok(()),
                GateMode::Fail(reason) => Err(anyhow::anyhow!(reason)),
                GateMode::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
            };
            result
        }
    }
}

pub fn describe_transition(transition: Transition) -> String {
    match transition {
        Transition::Moved { from, to } => format!(
            "moved {} -> {}",
            from.saturating_add(1),
            to.saturating_add(1)
        ),
        Transition::Unchanged => "already on the last step".to_string(),
        Transition::Busy => "a gate is still running".to_string(),
        Transition::Superseded => "gate passed, but the wizard moved meanwhile".to_string(),
    }
}

pub fn status_line(snapshot: &WizardSnapshot, location: &str) -> String {
    let mut flags = Vec::new();
    if snapshot.is_first_step {
        flags.push("first");
    }
    if snapshot.is_last_step {
        flags.push("last");
    }
    if snapshot.is_loading {
        flags.push("loading");
    }

    format!(
        "[{}/{}] {} {}location={}",
        snapshot.active_step.saturating_add(1),
        snapshot.step_count,
        snapshot.active_key().unwrap_or("-"),
        if flags.is_empty() {
            String::new()
        } else {
            format!("({}) ", flags.join(", "))
        },
        if location.is_empty() { "-" } else { location },
    )
}

pub fn render_view(view: &WizardView<'_, String>) -> String {
    let mut lines = Vec::new();
    if let Some(header) = view.header {
        lines.push(format!("== {header} =="));
    }
    match view.body {
        Body::Direct(content) => lines.push(format!("  {content}")),
        Body::Wrapped { wrapper, child } => lines.push(format!("  [{wrapper}: {child}]")),
        Body::Empty => lines.push("  (no step to show)".to_string()),
    }
    if let Some(footer) = view.footer {
        lines.push(format!("-- {footer}"));
    }
    lines.join("\n")
}
