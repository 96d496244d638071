use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Map, Value};

use config::locate;
use config::merge::{merge, EffectiveView};
use config::model::{Scope, Timing};
use config::settings::KNOWN_SETTINGS;
use gating::EvalContext;
use telemetry::{aggregate, read_records};

/// skill-bus — operator CLI for the hook dispatcher.
///
/// Reads and writes the same configuration files the hook consumes, through
/// the same merge semantics. Never rewrites a file it cannot parse.
///
/// Exit codes:
///   0  Success
///   1  Error (malformed file, unknown setting, missing home directory, ...)
#[derive(Parser)]
#[command(name = "skill-bus", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Project directory (default: current working directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the effective subscription list after merging both scopes
    List,
    /// Dry-run dispatch for one skill and report what would fire
    Simulate {
        skill: String,
        #[arg(long, default_value = "pre")]
        timing: String,
    },
    /// List skills discovered in the project and plugin caches
    Skills,
    /// Cross-reference discovered skills against the effective subscriptions
    Scan,
    /// Show configuration presence, effective settings, and the telemetry log
    Status,
    /// List the inserts of one scope
    Inserts {
        #[arg(long, value_enum)]
        scope: ScopeArg,
    },
    /// Write one setting into a scope's configuration file
    Set {
        name: String,
        value: String,
        #[arg(long, value_enum)]
        scope: ScopeArg,
    },
    /// Add an insert together with a subscription routing to it
    AddInsert {
        #[arg(long)]
        name: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        dynamic: Option<String>,
        /// JSON array of condition objects attached to the insert
        #[arg(long)]
        conditions: Option<String>,
        /// Skill-name glob the subscription matches
        #[arg(long)]
        on: String,
        /// Subscription timing: pre, post, or complete
        #[arg(long)]
        when: String,
        #[arg(long, value_enum)]
        scope: ScopeArg,
    },
    /// Aggregate the telemetry log
    Stats {
        /// Restrict to one session identifier
        #[arg(long)]
        session: Option<u32>,
        /// Restrict to the last N days
        #[arg(long)]
        days: Option<i64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Global,
    Project,
}

fn main() {
    let cli = Cli::parse();
    let cwd = cli
        .project
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let result = match cli.command {
        Command::List => cmd_list(&cwd),
        Command::Simulate { skill, timing } => cmd_simulate(&cwd, &skill, &timing),
        Command::Skills => cmd_skills(&cwd),
        Command::Scan => cmd_scan(&cwd),
        Command::Status => cmd_status(&cwd),
        Command::Inserts { scope } => cmd_inserts(&cwd, scope),
        Command::Set { name, value, scope } => cmd_set(&cwd, &name, &value, scope),
        Command::AddInsert {
            name,
            text,
            dynamic,
            conditions,
            on,
            when,
            scope,
        } => cmd_add_insert(
            &cwd,
            &name,
            &text,
            dynamic.as_deref(),
            conditions.as_deref(),
            &on,
            &when,
            scope,
        ),
        Command::Stats { session, days } => cmd_stats(&cwd, session, days),
    };

    if let Err(e) = result {
        eprintln!("[skill-bus] ERROR: {:#}", e);
        std::process::exit(1);
    }
}

/// Merge both scopes the way dispatch does, reporting warnings on stderr.
fn effective_view(cwd: &Path) -> EffectiveView {
    let sources = locate::ConfigSources::load(cwd);
    let mut warnings = Vec::new();
    let view = merge(
        sources.global.as_deref(),
        sources.project.as_deref(),
        &mut warnings,
    );
    for warning in warnings {
        eprintln!("[skill-bus] WARNING: {}", warning);
    }
    view
}

fn cmd_list(cwd: &Path) -> anyhow::Result<()> {
    let view = effective_view(cwd);
    if view.subscriptions.is_empty() {
        println!("No effective subscriptions.");
        return Ok(());
    }

    println!("{:<20} {:<24} {:<10} {:<8} Notes", "Insert", "On", "Timing", "Scope");
    println!("{}", "-".repeat(78));
    for sub in &view.subscriptions {
        let mut notes = Vec::new();
        if !view.inserts.contains_key(&sub.insert) {
            notes.push("dangling insert");
        }
        if sub.timing == Timing::Complete && !view.settings.completion_hooks {
            notes.push("gated off (completionHooks=false)");
        }
        println!(
            "{:<20} {:<24} {:<10} {:<8} {}",
            sub.insert,
            sub.pattern,
            sub.timing,
            sub.scope.label(),
            notes.join(", ")
        );
    }
    Ok(())
}

fn cmd_simulate(cwd: &Path, skill: &str, timing: &str) -> anyhow::Result<()> {
    let timing = Timing::parse(timing)
        .ok_or_else(|| anyhow!("unknown timing '{}' (pre, post, or complete)", timing))?;
    let view = effective_view(cwd);
    let mut warnings = Vec::new();

    let candidates = dispatch::matcher::select(
        &view.subscriptions,
        skill,
        timing,
        false,
        view.settings.completion_hooks,
        &mut warnings,
    );
    if candidates.is_empty() {
        println!("No subscriptions match '{}' at {} timing.", skill, timing);
        return Ok(());
    }

    let ctx = EvalContext::from_process(cwd);
    let mut fired = 0usize;
    for sub in candidates {
        let insert_conditions = view
            .inserts
            .get(&sub.insert)
            .filter(|_| sub.inherit_conditions)
            .map(|i| i.conditions.as_slice())
            .unwrap_or(&[]);
        let verdict = match gating::first_failure(insert_conditions, &ctx, &mut warnings) {
            Some(i) => format!("SKIP (insert condition #{})", i + 1),
            None => match gating::first_failure(&sub.conditions, &ctx, &mut warnings) {
                Some(i) => format!("SKIP (subscription condition #{})", i + 1),
                None => {
                    fired += 1;
                    if view.inserts.contains_key(&sub.insert) {
                        if fired as u32 > view.settings.max_matches_per_skill {
                            "FIRE (dropped by ceiling)".to_string()
                        } else {
                            "FIRE".to_string()
                        }
                    } else {
                        "FIRE (dangling insert, no text)".to_string()
                    }
                }
            },
        };
        println!("{:<20} {:<24} {}", sub.insert, sub.pattern, verdict);
    }
    for warning in warnings {
        eprintln!("[skill-bus] WARNING: {}", warning);
    }
    Ok(())
}

fn cmd_skills(cwd: &Path) -> anyhow::Result<()> {
    let skills = discover_skills(cwd);
    if skills.is_empty() {
        println!("No skills discovered.");
        return Ok(());
    }
    for skill in skills {
        println!("{}", skill);
    }
    Ok(())
}

fn cmd_scan(cwd: &Path) -> anyhow::Result<()> {
    let view = effective_view(cwd);
    let skills = discover_skills(cwd);
    if skills.is_empty() {
        println!("No skills discovered.");
        return Ok(());
    }

    let mut warnings = Vec::new();
    println!("{:<40} Coverage", "Skill");
    println!("{}", "-".repeat(60));
    for skill in &skills {
        let subscribed: Vec<&str> = view
            .subscriptions
            .iter()
            .filter(|sub| {
                dispatch::matcher::pattern_matches(&sub.pattern, skill, false, &mut warnings)
            })
            .map(|sub| sub.insert.as_str())
            .collect();
        if subscribed.is_empty() {
            println!("{:<40} (none)", skill);
        } else {
            println!("{:<40} {}", skill, subscribed.join(", "));
        }
    }
    Ok(())
}

fn cmd_status(cwd: &Path) -> anyhow::Result<()> {
    let global_path = locate::global_config_path();
    let project_path = locate::project_config_path(cwd);

    match &global_path {
        Some(p) => println!("Global config:  {} ({})", p.display(), presence(p)),
        None => println!("Global config:  (no home directory)"),
    }
    println!(
        "Project config: {} ({})",
        project_path.display(),
        presence(&project_path)
    );

    let view = effective_view(cwd);
    let s = &view.settings;
    println!();
    println!("Effective settings:");
    println!("  enabled               {}", s.enabled);
    println!("  maxMatchesPerSkill    {}", s.max_matches_per_skill);
    println!("  showConsoleEcho       {}", s.show_console_echo);
    println!("  disableGlobal         {}", s.disable_global);
    println!("  monitorSlashCommands  {}", s.monitor_slash_commands);
    println!("  completionHooks       {}", s.completion_hooks);
    println!("  showConditionSkips    {}", s.show_condition_skips);
    println!("  telemetry             {}", s.telemetry);
    println!("  observeUnmatched      {}", s.observe_unmatched);
    println!(
        "  telemetryPath         {}",
        if s.telemetry_path.is_empty() {
            "(default)"
        } else {
            &s.telemetry_path
        }
    );
    println!("  maxLogSizeKB          {}", s.max_log_size_kb);

    let log = locate::telemetry_path(cwd, s);
    let size = std::fs::metadata(&log).map(|m| m.len()).unwrap_or(0);
    println!();
    println!("Telemetry log:  {} ({} bytes)", log.display(), size);
    println!(
        "Subscriptions:  {} effective, {} insert(s)",
        view.subscriptions.len(),
        view.inserts.len()
    );
    Ok(())
}

fn presence(path: &Path) -> &'static str {
    if path.exists() {
        "present"
    } else {
        "absent"
    }
}

fn cmd_inserts(cwd: &Path, scope: ScopeArg) -> anyhow::Result<()> {
    let path = scope_path(cwd, scope)?;
    let Some(text) = locate::read_optional(&path) else {
        println!("No {} configuration file.", scope_label(scope));
        return Ok(());
    };
    let mut warnings = Vec::new();
    let file = config::model::ConfigFile::parse(&text, model_scope(scope), &mut warnings)
        .map_err(|e| anyhow!("{}: {}; fix JSON syntax first", path.display(), e))?;
    for warning in warnings {
        eprintln!("[skill-bus] WARNING: {}", warning);
    }

    if file.inserts.is_empty() {
        println!("No inserts in {} scope.", scope_label(scope));
        return Ok(());
    }
    for (name, insert) in &file.inserts {
        let mut details = vec![format!("{} chars", insert.text.chars().count())];
        if let Some(handler) = &insert.dynamic {
            details.push(format!("dynamic: {}", handler));
        }
        if !insert.conditions.is_empty() {
            details.push(format!("{} condition(s)", insert.conditions.len()));
        }
        println!("{:<20} {}", name, details.join(", "));
    }
    Ok(())
}

fn cmd_set(cwd: &Path, name: &str, value: &str, scope: ScopeArg) -> anyhow::Result<()> {
    if !KNOWN_SETTINGS.contains(&name) {
        bail!(
            "unknown setting '{}' (known: {})",
            name,
            KNOWN_SETTINGS.join(", ")
        );
    }
    let coerced = coerce_setting(name, value)?;

    let path = scope_path(cwd, scope)?;
    let mut root = load_editable(&path)?;
    let settings = root
        .entry("settings")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow!("settings region is not an object; fix it first"))?;
    settings.insert(name.to_string(), coerced);
    save(&path, &root)?;

    eprintln!(
        "[skill-bus] {} = {} written to {} scope",
        name,
        value,
        scope_label(scope)
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_add_insert(
    cwd: &Path,
    name: &str,
    text: &str,
    dynamic: Option<&str>,
    conditions: Option<&str>,
    on: &str,
    when: &str,
    scope: ScopeArg,
) -> anyhow::Result<()> {
    if Timing::parse(when).is_none() {
        bail!("unknown timing '{}' (pre, post, or complete)", when);
    }
    let conditions: Value = match conditions {
        None => json!([]),
        Some(raw) => {
            let parsed: Value =
                serde_json::from_str(raw).context("--conditions is not valid JSON")?;
            if !parsed.is_array() {
                bail!("--conditions must be a JSON array of condition objects");
            }
            parsed
        }
    };

    let path = scope_path(cwd, scope)?;
    let mut root = load_editable(&path)?;

    let mut insert = Map::new();
    insert.insert("text".to_string(), json!(text));
    if let Some(handler) = dynamic {
        insert.insert("dynamic".to_string(), json!(handler));
    }
    if !conditions.as_array().is_some_and(Vec::is_empty) {
        insert.insert("conditions".to_string(), conditions);
    }
    root.entry("inserts")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| anyhow!("inserts region is not an object; fix it first"))?
        .insert(name.to_string(), Value::Object(insert));

    let subscription = json!({"insert": name, "on": on, "timing": when});
    let subs = root
        .entry("subscriptions")
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or_else(|| anyhow!("subscriptions region is not an array; fix it first"))?;
    // Same identity tuple replaces in place, mirroring the merge's dedup.
    let existing = subs.iter().position(|s| {
        s.get("insert").and_then(Value::as_str) == Some(name)
            && s.get("on").and_then(Value::as_str) == Some(on)
            && s.get("timing").and_then(Value::as_str) == Some(when)
    });
    match existing {
        Some(i) => subs[i] = subscription,
        None => subs.push(subscription),
    }

    save(&path, &root)?;
    eprintln!(
        "[skill-bus] insert '{}' subscribed to '{}' ({}) in {} scope",
        name,
        on,
        when,
        scope_label(scope)
    );
    Ok(())
}

fn cmd_stats(cwd: &Path, session: Option<u32>, days: Option<i64>) -> anyhow::Result<()> {
    let view = effective_view(cwd);
    let log = locate::telemetry_path(cwd, &view.settings);
    let records = read_records(&log);

    let since = days.map(|d| {
        (chrono::Local::now() - chrono::Duration::days(d)).fixed_offset()
    });
    let agg = aggregate(&records, session, since);

    if agg.total == 0 {
        println!("No telemetry events in {}.", log.display());
        return Ok(());
    }

    println!("{} event(s) in {}", agg.total, log.display());
    print_counts("Matches by skill", &agg.matches_by_skill);
    print_counts("Matches by insert", &agg.matches_by_insert);
    print_counts("Condition skips by insert", &agg.skips_by_insert);
    print_counts("No coverage by skill", &agg.no_match_by_skill);
    print_counts("Completions by skill", &agg.completions_by_skill);
    Ok(())
}

fn print_counts(title: &str, map: &std::collections::BTreeMap<String, u64>) {
    if map.is_empty() {
        return;
    }
    println!();
    println!("{}:", title);
    for (name, count) in map {
        println!("  {:<36} {}", name, count);
    }
}

/// Load a configuration file for editing. Refuses to touch a file it cannot
/// parse: a malformed file must be fixed by hand, never overwritten.
fn load_editable(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let Some(text) = locate::read_optional(path) else {
        return Ok(Map::new());
    };
    let value: Value = serde_json::from_str(&text)
        .map_err(|_| anyhow!("{} is malformed; fix JSON syntax first", path.display()))?;
    value
        .as_object()
        .cloned()
        .ok_or_else(|| anyhow!("{} is malformed; fix JSON syntax first", path.display()))
}

fn save(path: &Path, root: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let pretty = serde_json::to_string_pretty(&Value::Object(root.clone()))?;
    std::fs::write(path, pretty + "\n").with_context(|| format!("writing {}", path.display()))
}

fn scope_path(cwd: &Path, scope: ScopeArg) -> anyhow::Result<PathBuf> {
    match scope {
        ScopeArg::Global => locate::global_config_path()
            .ok_or_else(|| anyhow!("cannot locate a home directory for global scope")),
        ScopeArg::Project => Ok(locate::project_config_path(cwd)),
    }
}

fn scope_label(scope: ScopeArg) -> &'static str {
    match scope {
        ScopeArg::Global => "global",
        ScopeArg::Project => "project",
    }
}

fn model_scope(scope: ScopeArg) -> Scope {
    match scope {
        ScopeArg::Global => Scope::Global,
        ScopeArg::Project => Scope::Project,
    }
}

fn coerce_setting(name: &str, value: &str) -> anyhow::Result<Value> {
    match name {
        "telemetryPath" => Ok(json!(value)),
        "maxMatchesPerSkill" => {
            let n: u64 = value.parse().context("expected an integer")?;
            if n < 1 {
                bail!("maxMatchesPerSkill must be at least 1");
            }
            Ok(json!(n))
        }
        "maxLogSizeKB" => {
            let n: u64 = value.parse().context("expected an integer")?;
            Ok(json!(n))
        }
        _ => match value {
            "true" => Ok(json!(true)),
            "false" => Ok(json!(false)),
            other => bail!("expected 'true' or 'false', got '{}'", other),
        },
    }
}

/// Skill discovery: project and personal `.claude/skills/<name>/SKILL.md`
/// (bare names) and the plugin cache `~/.claude/plugins/<plugin>/skills/
/// <skill>/SKILL.md` (plugin-qualified names).
fn discover_skills(cwd: &Path) -> Vec<String> {
    let mut skills = Vec::new();

    for root in [Some(cwd.to_path_buf()), dirs::home_dir()].into_iter().flatten() {
        let dir = root.join(".claude").join("skills");
        for name in subdirs_with_marker(&dir) {
            skills.push(name);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let plugins = home.join(".claude").join("plugins");
        if let Ok(entries) = std::fs::read_dir(&plugins) {
            let mut plugin_dirs: Vec<PathBuf> =
                entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
            plugin_dirs.sort();
            for plugin_dir in plugin_dirs {
                let Some(plugin) = plugin_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                for skill in subdirs_with_marker(&plugin_dir.join("skills")) {
                    skills.push(format!("{}:{}", plugin, skill));
                }
            }
        }
    }

    skills.sort();
    skills.dedup();
    skills
}

fn subdirs_with_marker(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().join("SKILL.md").exists())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    names
}
