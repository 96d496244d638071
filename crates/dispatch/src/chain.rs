use config::model::{Subscription, Timing};

use crate::matcher;

/// Reserved synthetic skill the model invokes to declare a skill's scope of
/// work complete.
pub const COMPLETION_SKILL: &str = "skill-bus:complete";
/// Carries the chain depth between the router and the orchestrator.
pub const DEPTH_ENV: &str = "SKILL_BUS_CHAIN_DEPTH";
/// Forces the condition-skip echo on, regardless of settings.
pub const DEBUG_ENV: &str = "SKILL_BUS_DEBUG";
/// A chain stops producing text once the received depth reaches this bound.
pub const MAX_CHAIN_DEPTH: u32 = 5;

/// Chain depth of the current invocation, defaulting to zero outside a chain.
pub fn current_depth() -> u32 {
    std::env::var(DEPTH_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

pub fn set_depth(depth: u32) {
    std::env::set_var(DEPTH_ENV, depth.to_string());
}

/// What the completion-signal arguments resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Dispatch completion subscriptions for this skill at this depth.
    Dispatch { skill: String, depth: u32 },
    /// The received depth is at or past the bound; warn and stop.
    Exhausted(u32),
    /// Missing or unusable arguments; exit silently.
    Silent,
}

/// Extract the completed skill and the optional `--depth N` token from the
/// completion signal's arguments.
pub fn parse_completion_args(args: Option<&str>) -> CompletionOutcome {
    let Some(args) = args else {
        return CompletionOutcome::Silent;
    };
    let trimmed = args.trim();
    if trimmed.is_empty() || trimmed.starts_with("--") {
        return CompletionOutcome::Silent;
    }

    let mut depth: u32 = 0;
    let mut skill: Option<&str> = None;
    let mut tokens = trimmed.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "--depth" {
            if let Some(n) = tokens.next().and_then(|v| v.parse().ok()) {
                depth = n;
            }
        } else if skill.is_none() {
            skill = Some(token);
        }
    }

    match skill {
        None => CompletionOutcome::Silent,
        Some(_) if depth >= MAX_CHAIN_DEPTH => CompletionOutcome::Exhausted(depth),
        Some(skill) => CompletionOutcome::Dispatch {
            skill: skill.to_string(),
            depth,
        },
    }
}

/// Does any completion-timing subscription's pattern match this skill?
/// Conditions are deliberately ignored here; they are re-checked when the
/// completion signal actually arrives.
pub fn has_completion_subscribers(
    subscriptions: &[Subscription],
    skill: &str,
    prompt_mode: bool,
    warnings: &mut Vec<String>,
) -> bool {
    subscriptions
        .iter()
        .filter(|sub| sub.timing == Timing::Complete)
        .any(|sub| matcher::pattern_matches(&sub.pattern, skill, prompt_mode, warnings))
}

/// The synthetic instruction appended during pre-timing when a skill has
/// completion subscribers. The depth travels inside the instruction so the
/// next invocation can increment and re-bound it.
pub fn completion_instruction(skill: &str, next_depth: u32) -> String {
    format!(
        "When you have finished the scope of work for this skill, \
         invoke the completion signal with `{skill} --depth {next_depth}`: \
         call the Skill tool with skill \"{COMPLETION_SKILL}\" and \
         args \"{skill} --depth {next_depth}\"."
    )
}

pub fn exhausted_warning(depth: u32) -> String {
    format!("chain depth limit reached ({}); no further injections", depth)
}
