use std::path::PathBuf;

use serde_json::Value;

/// Which hook delivered the event. Selected by the entrypoint subcommand;
/// the host wires one subcommand per hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pre,
    Post,
    Prompt,
}

impl Stage {
    pub fn hook_event_name(&self) -> &'static str {
        match self {
            Stage::Pre => "PreToolUse",
            Stage::Post => "PostToolUse",
            Stage::Prompt => "UserPromptSubmit",
        }
    }

    /// Source label recorded in telemetry.
    pub fn source_label(&self) -> &'static str {
        match self {
            Stage::Pre | Stage::Post => "tool",
            Stage::Prompt => "prompt",
        }
    }
}

/// Built-in slash commands the prompt monitor never matches against
/// subscriptions. (The completion signal is routed to the orchestrator
/// separately, before this list applies.)
pub const BUILTIN_COMMANDS: &[&str] = &[
    "help", "clear", "compact", "init", "login", "logout", "config", "status", "doctor",
    "memory", "cost", "tasks",
];

/// A tool-call invocation of a skill.
#[derive(Debug, Clone)]
pub struct ToolEvent {
    pub skill: String,
    pub args: Option<String>,
    pub cwd: PathBuf,
}

/// A slash-prefixed user prompt, split into the bare command and the rest.
#[derive(Debug, Clone)]
pub struct PromptEvent {
    pub command: String,
    pub rest: String,
    pub cwd: PathBuf,
}

/// Parse a tool hook event. Anything that is not a `Skill` tool call with a
/// skill name is not ours: `None` means pass through silently.
pub fn parse_tool_event(raw: &str) -> Option<ToolEvent> {
    let payload: Value = serde_json::from_str(raw).ok()?;
    if payload.get("tool_name").and_then(Value::as_str) != Some("Skill") {
        return None;
    }
    let input = payload.get("tool_input")?;
    let skill = input.get("skill").and_then(Value::as_str)?.to_string();
    if skill.is_empty() {
        return None;
    }
    Some(ToolEvent {
        skill,
        args: input
            .get("args")
            .and_then(Value::as_str)
            .map(str::to_string),
        cwd: event_cwd(&payload),
    })
}

/// Parse a prompt hook event. Only slash-prefixed prompts are candidates.
pub fn parse_prompt_event(raw: &str) -> Option<PromptEvent> {
    let payload: Value = serde_json::from_str(raw).ok()?;
    let prompt = payload.get("prompt").and_then(Value::as_str)?;
    let body = prompt.strip_prefix('/')?;
    let mut parts = body.splitn(2, char::is_whitespace);
    let command = parts.next()?.trim().to_string();
    if command.is_empty() {
        return None;
    }
    Some(PromptEvent {
        command,
        rest: parts.next().unwrap_or("").trim().to_string(),
        cwd: event_cwd(&payload),
    })
}

fn event_cwd(payload: &Value) -> PathBuf {
    payload
        .get("cwd")
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
