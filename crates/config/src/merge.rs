use std::collections::{BTreeMap, HashSet};

use crate::model::{ConfigFile, Insert, RawSubscription, Scope, Subscription, Timing};
use crate::settings::Settings;

/// The merged, deduplicated, override-processed projection of both scopes.
#[derive(Debug, Clone)]
pub struct EffectiveView {
    pub settings: Settings,
    pub inserts: BTreeMap<String, Insert>,
    pub subscriptions: Vec<Subscription>,
}

/// Merge the two configuration files into one effective view.
///
/// Pure over its inputs: the caller reads the file bytes, so tests can drive
/// this with literals. `None` means the file does not exist; a malformed file
/// warns and behaves as absent while the other file is still processed.
pub fn merge(
    global: Option<&str>,
    project: Option<&str>,
    warnings: &mut Vec<String>,
) -> EffectiveView {
    let global_file = load(global, Scope::Global, warnings);
    let project_file = load(project, Scope::Project, warnings);

    let mut settings = Settings::default();
    settings.overlay(&global_file.settings, Scope::Global, warnings);
    settings.overlay(&project_file.settings, Scope::Project, warnings);

    // Master gate: nothing fires, and the one-line advisory is the only output.
    if !settings.enabled {
        warnings.push("skill-bus is disabled by settings (enabled=false)".to_string());
        return EffectiveView {
            settings,
            inserts: BTreeMap::new(),
            subscriptions: Vec::new(),
        };
    }

    let inserts = merge_inserts(&global_file, &project_file, warnings);
    let subscriptions = merge_subscriptions(&global_file, &project_file, &settings, warnings);

    EffectiveView {
        settings,
        inserts,
        subscriptions,
    }
}

fn load(text: Option<&str>, scope: Scope, warnings: &mut Vec<String>) -> ConfigFile {
    match text {
        None => ConfigFile::default(),
        Some(text) => match ConfigFile::parse(text, scope, warnings) {
            Ok(file) => file,
            Err(e) => {
                warnings.push(format!(
                    "{} configuration is unreadable ({}); treating it as absent",
                    scope.label(),
                    e
                ));
                ConfigFile::default()
            }
        },
    }
}

fn merge_inserts(
    global: &ConfigFile,
    project: &ConfigFile,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, Insert> {
    let mut merged = global.inserts.clone();
    for (name, insert) in &project.inserts {
        if merged.insert(name.clone(), insert.clone()).is_some() {
            warnings.push(format!(
                "insert '{}' is defined in both scopes; the project version takes precedence",
                name
            ));
        }
    }
    merged
}

fn merge_subscriptions(
    global: &ConfigFile,
    project: &ConfigFile,
    settings: &Settings,
    warnings: &mut Vec<String>,
) -> Vec<Subscription> {
    // Disable directives come from project entries with enabled=false.
    // A complete identity tuple removes the matching global entry; a bare
    // insert name removes every global entry referencing that insert.
    let mut removed_tuples: HashSet<(String, String, Timing)> = HashSet::new();
    let mut removed_inserts: HashSet<String> = HashSet::new();
    for raw in &project.subscriptions {
        if raw.enabled {
            continue;
        }
        let Some(insert) = raw.insert.clone() else {
            warnings.push("project disable entry has no insert name; ignored".to_string());
            continue;
        };
        match (&raw.pattern, raw.timing.as_deref().and_then(Timing::parse)) {
            (Some(pattern), Some(timing)) => {
                removed_tuples.insert((insert, pattern.clone(), timing));
            }
            _ => {
                removed_inserts.insert(insert);
            }
        }
    }

    let mut ordered: Vec<Subscription> = Vec::new();
    if !settings.disable_global {
        for raw in &global.subscriptions {
            let Some(sub) = validate(raw, Scope::Global, warnings) else {
                continue;
            };
            if removed_inserts.contains(&sub.insert) {
                continue;
            }
            if removed_tuples.contains(&(
                sub.insert.clone(),
                sub.pattern.clone(),
                sub.timing,
            )) {
                continue;
            }
            ordered.push(sub);
        }
    }
    for raw in &project.subscriptions {
        if !raw.enabled {
            continue;
        }
        if let Some(sub) = validate(raw, Scope::Project, warnings) {
            ordered.push(sub);
        }
    }

    dedup_keep_last(ordered)
}

/// Promote a raw entry to an effective subscription, or warn and drop it.
fn validate(
    raw: &RawSubscription,
    scope: Scope,
    warnings: &mut Vec<String>,
) -> Option<Subscription> {
    let Some(insert) = raw.insert.clone() else {
        warnings.push(format!(
            "{} subscription has no insert name; skipped",
            scope.label()
        ));
        return None;
    };
    let Some(pattern) = raw.pattern.clone() else {
        warnings.push(format!(
            "{} subscription for insert '{}' has no 'on' pattern; skipped",
            scope.label(),
            insert
        ));
        return None;
    };
    let timing = match &raw.timing {
        Some(t) => match Timing::parse(t) {
            Some(timing) => timing,
            None => {
                warnings.push(format!(
                    "{} subscription for insert '{}' has unknown timing '{}'; skipped",
                    scope.label(),
                    insert,
                    t
                ));
                return None;
            }
        },
        None => {
            warnings.push(format!(
                "{} subscription for insert '{}' has no timing; skipped",
                scope.label(),
                insert
            ));
            return None;
        }
    };
    Some(Subscription {
        insert,
        pattern,
        timing,
        inherit_conditions: raw.inherit_conditions,
        conditions: raw.conditions.clone(),
        scope,
    })
}

/// Dedup by identity tuple, keeping each tuple at its last occurrence's
/// position so a project redefinition of a global rule fires in project order.
fn dedup_keep_last(ordered: Vec<Subscription>) -> Vec<Subscription> {
    let mut seen: HashSet<(String, String, Timing)> = HashSet::new();
    let mut kept: Vec<Subscription> = Vec::new();
    for sub in ordered.into_iter().rev() {
        let key = (sub.insert.clone(), sub.pattern.clone(), sub.timing);
        if seen.insert(key) {
            kept.push(sub);
        }
    }
    kept.reverse();
    kept
}
