use std::path::Path;
use std::time::{Duration, Instant};

use config::locate::{self, ConfigSources};
use config::merge::{merge, EffectiveView};
use config::model::{Subscription, Timing};
use gating::EvalContext;
use telemetry::{EventKind, Sink};

use crate::chain::{self, CompletionOutcome, COMPLETION_SKILL, DEBUG_ENV};
use crate::event::{self, Stage, BUILTIN_COMMANDS};
use crate::fastpath;
use crate::matcher;
use crate::output;
use crate::resolver;

/// Past this, a warning tells the user context may be incomplete; the host
/// kills the process at 5 s regardless.
const TIMEOUT_WARN_AFTER: Duration = Duration::from_secs(4);

/// Dispatch one host event. Returns the stdout line, or `None` for a silent
/// pass-through. Infallible by contract: every internal fault degrades to a
/// warning or to silence, and the caller always exits zero.
pub fn run(stage: Stage, raw_event: &str) -> Option<String> {
    let started = Instant::now();
    match stage {
        Stage::Pre | Stage::Post => run_tool(stage, raw_event, started),
        Stage::Prompt => run_prompt(raw_event, started),
    }
}

fn run_tool(stage: Stage, raw_event: &str, started: Instant) -> Option<String> {
    let ev = event::parse_tool_event(raw_event)?;

    if ev.skill == COMPLETION_SKILL {
        // Post-timing invocations of the signal are no-ops.
        if stage == Stage::Post {
            return None;
        }
        return run_completion(stage, ev.args.as_deref(), &ev.cwd, started);
    }

    let sources = ConfigSources::load(&ev.cwd);
    if !sources.any_present() {
        let nudge = fastpath::first_run_nudge(&ev.cwd)?;
        return output::render(stage.hook_event_name(), &[], None, &[nudge]);
    }

    let raw = source_texts(&sources);
    if !fastpath::covered(&ev.skill, &raw) {
        log_no_coverage(&ev.skill, "fast-path", &ev.cwd, &raw);
        return None;
    }

    slow_dispatch(SlowArgs {
        stage,
        skill: &ev.skill,
        timing: if stage == Stage::Post { Timing::Post } else { Timing::Pre },
        prompt_mode: false,
        completion: false,
        cwd: &ev.cwd,
        sources,
        started,
    })
}

fn run_prompt(raw_event: &str, started: Instant) -> Option<String> {
    let ev = event::parse_prompt_event(raw_event)?;

    if ev.command == COMPLETION_SKILL {
        return run_completion(Stage::Prompt, Some(ev.rest.as_str()), &ev.cwd, started);
    }
    if BUILTIN_COMMANDS.contains(&ev.command.as_str()) {
        return None;
    }

    let sources = ConfigSources::load(&ev.cwd);
    if !sources.any_present() {
        return None;
    }
    let raw = source_texts(&sources);
    // Prompt events arrive on every user message; without the monitor setting
    // sniffing true somewhere, this path must stay in the fast tier.
    if !fastpath::sniff_setting_true("monitorSlashCommands", &raw) {
        return None;
    }
    if !fastpath::covered(&ev.command, &raw) {
        log_no_coverage(&ev.command, "prompt-fast-path", &ev.cwd, &raw);
        return None;
    }

    slow_dispatch(SlowArgs {
        stage: Stage::Prompt,
        skill: &ev.command,
        timing: Timing::Pre,
        prompt_mode: true,
        completion: false,
        cwd: &ev.cwd,
        sources,
        started,
    })
}

fn run_completion(
    stage: Stage,
    args: Option<&str>,
    cwd: &Path,
    started: Instant,
) -> Option<String> {
    match chain::parse_completion_args(args) {
        CompletionOutcome::Silent => None,
        CompletionOutcome::Exhausted(depth) => output::render(
            stage.hook_event_name(),
            &[],
            None,
            &[chain::exhausted_warning(depth)],
        ),
        CompletionOutcome::Dispatch { skill, depth } => {
            chain::set_depth(depth + 1);
            let sources = ConfigSources::load(cwd);
            if !sources.any_present() {
                return None;
            }
            slow_dispatch(SlowArgs {
                stage,
                skill: &skill,
                timing: Timing::Complete,
                prompt_mode: stage == Stage::Prompt,
                completion: true,
                cwd,
                sources,
                started,
            })
        }
    }
}

struct SlowArgs<'a> {
    stage: Stage,
    skill: &'a str,
    timing: Timing,
    prompt_mode: bool,
    completion: bool,
    cwd: &'a Path,
    sources: ConfigSources,
    started: Instant,
}

fn slow_dispatch(args: SlowArgs<'_>) -> Option<String> {
    let mut warnings: Vec<String> = Vec::new();
    let view = merge(
        args.sources.global.as_deref(),
        args.sources.project.as_deref(),
        &mut warnings,
    );
    let event_name = args.stage.hook_event_name();

    // Authoritative re-check of the sniffed prompt-monitor gate.
    if args.stage == Stage::Prompt && !args.completion && !view.settings.monitor_slash_commands {
        return None;
    }
    if !view.settings.enabled {
        return output::render(event_name, &[], None, &warnings);
    }

    let telemetry_log = locate::telemetry_path(args.cwd, &view.settings);
    let sink = Sink::new(
        &telemetry_log,
        view.settings.telemetry,
        view.settings.observe_unmatched,
        view.settings.max_log_size_kb,
    );

    if args.completion {
        sink.record(EventKind::SkillComplete {
            skill: args.skill.to_string(),
        });
    }

    let candidates = matcher::select(
        &view.subscriptions,
        args.skill,
        args.timing,
        args.prompt_mode,
        view.settings.completion_hooks,
        &mut warnings,
    );
    if candidates.is_empty() {
        sink.record(EventKind::NoMatch {
            skill: args.skill.to_string(),
            source: args.stage.source_label().to_string(),
        });
    }

    let ctx = EvalContext::from_process(args.cwd);
    let mut passed: Vec<&Subscription> = Vec::new();
    let mut skipped: Vec<String> = Vec::new();
    for sub in candidates {
        match first_failing_condition(sub, &view, &ctx, &mut warnings) {
            None => passed.push(sub),
            Some((list, index)) => {
                sink.record(EventKind::ConditionSkip {
                    skill: args.skill.to_string(),
                    insert: sub.insert.clone(),
                    pattern: sub.pattern.clone(),
                    list: list.to_string(),
                    index,
                });
                skipped.push(sub.insert.clone());
            }
        }
    }

    let fired = matcher::apply_ceiling(passed, view.settings.max_matches_per_skill, &mut warnings);

    let mut texts: Vec<String> = Vec::new();
    let mut fired_names: Vec<String> = Vec::new();
    for sub in &fired {
        match view.inserts.get(&sub.insert) {
            Some(insert) => texts.push(resolver::resolve(insert, &telemetry_log, &mut warnings)),
            None => {
                // Dangling reference: the slot is consumed, no text flows.
                warnings.push(format!(
                    "subscription references unknown insert '{}'; it contributes no text",
                    sub.insert
                ));
                texts.push(String::new());
            }
        }
        fired_names.push(sub.insert.clone());
        sink.record(EventKind::Match {
            skill: args.skill.to_string(),
            insert: sub.insert.clone(),
            timing: sub.timing.as_str().to_string(),
            source: args.stage.source_label().to_string(),
        });
    }

    // Pre-timing augmentation: happens even when nothing matched above.
    if args.timing == Timing::Pre
        && view.settings.completion_hooks
        && chain::has_completion_subscribers(
            &view.subscriptions,
            args.skill,
            args.prompt_mode,
            &mut warnings,
        )
    {
        texts.push(chain::completion_instruction(
            args.skill,
            chain::current_depth() + 1,
        ));
    }

    let echo = (view.settings.show_console_echo && !fired_names.is_empty()).then(|| {
        let show_skips = view.settings.show_condition_skips || debug_forced();
        output::echo_line(&fired_names, &skipped, show_skips)
    });

    if args.started.elapsed() > TIMEOUT_WARN_AFTER {
        warnings.push(
            "dispatch exceeded 4 s; the host may abort and load the skill without context"
                .to_string(),
        );
    }

    output::render(event_name, &texts, echo, &warnings)
}

/// Insert-level conditions first (unless inheritance is opted out), then
/// subscription-level, each left-to-right with short-circuit.
fn first_failing_condition(
    sub: &Subscription,
    view: &EffectiveView,
    ctx: &EvalContext,
    warnings: &mut Vec<String>,
) -> Option<(&'static str, usize)> {
    if sub.inherit_conditions {
        if let Some(insert) = view.inserts.get(&sub.insert) {
            if let Some(index) = gating::first_failure(&insert.conditions, ctx, warnings) {
                return Some(("insert", index));
            }
        }
    }
    gating::first_failure(&sub.conditions, ctx, warnings).map(|index| ("subscription", index))
}

fn source_texts(sources: &ConfigSources) -> Vec<&str> {
    sources
        .global
        .iter()
        .chain(sources.project.iter())
        .map(String::as_str)
        .collect()
}

fn debug_forced() -> bool {
    std::env::var(DEBUG_ENV).is_ok_and(|v| !v.is_empty())
}

/// Fast-path no-coverage telemetry. Settings are sniffed, not parsed: the
/// fast tier never builds the JSON AST.
fn log_no_coverage(skill: &str, source: &str, cwd: &Path, raw: &[&str]) {
    if !fastpath::sniff_setting_true("telemetry", raw)
        || !fastpath::sniff_setting_true("observeUnmatched", raw)
    {
        return;
    }
    let path = match fastpath::sniff_telemetry_path(raw) {
        Some(p) if Path::new(&p).is_absolute() => std::path::PathBuf::from(p),
        Some(p) => cwd.join(p),
        None => locate::state_dir(cwd).join(locate::TELEMETRY_FILE_NAME),
    };
    let sink = Sink::new(&path, true, true, 0);
    sink.record(EventKind::NoMatch {
        skill: skill.to_string(),
        source: source.to_string(),
    });
}
