use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

/// Which configuration file an element came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Project,
}

impl Scope {
    pub fn label(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Project => "project",
        }
    }
}

/// When a subscription fires relative to the skill it watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    Pre,
    Post,
    Complete,
}

impl Timing {
    /// Parse the closed timing set. Anything else is schema drift.
    pub fn parse(s: &str) -> Option<Timing> {
        match s {
            "pre" => Some(Timing::Pre),
            "post" => Some(Timing::Post),
            "complete" => Some(Timing::Complete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timing::Pre => "pre",
            Timing::Post => "post",
            Timing::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Timing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, reusable unit of injectable content.
/// Conditions stay as raw JSON values; they are parsed at evaluation time so
/// one malformed condition cannot poison the whole file.
#[derive(Debug, Clone)]
pub struct Insert {
    pub name: String,
    pub text: String,
    pub dynamic: Option<String>,
    pub conditions: Vec<Value>,
}

/// A routing rule in the effective view. Always fully validated: the pattern
/// is present and the timing is from the closed set.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub insert: String,
    pub pattern: String,
    pub timing: Timing,
    pub inherit_conditions: bool,
    pub conditions: Vec<Value>,
    pub scope: Scope,
}

impl Subscription {
    /// The identity tuple used for dedup and override matching.
    pub fn identity(&self) -> (&str, &str, Timing) {
        (&self.insert, &self.pattern, self.timing)
    }
}

/// A subscription as it appears in a file, before validation. Disable-only
/// entries (`enabled: false` with a partial tuple) are legal here.
#[derive(Debug, Clone)]
pub struct RawSubscription {
    pub insert: Option<String>,
    pub pattern: Option<String>,
    pub timing: Option<String>,
    pub enabled: bool,
    pub inherit_conditions: bool,
    pub conditions: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed JSON: {0}")]
    Syntax(String),
    #[error("top-level value is not an object")]
    NotAnObject,
}

/// One parsed configuration file. Unknown top-level keys are ignored.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub settings: Map<String, Value>,
    pub inserts: BTreeMap<String, Insert>,
    pub subscriptions: Vec<RawSubscription>,
}

impl ConfigFile {
    /// Parse one file's bytes. A syntax error or non-object top level is
    /// returned as `Err` so the caller can warn and treat the file as absent.
    /// Element-level drift (wrong-typed insert, non-object subscription) is
    /// tolerated in place with a warning.
    pub fn parse(text: &str, scope: Scope, warnings: &mut Vec<String>) -> Result<Self, ConfigError> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Syntax(e.to_string()))?;
        let root = root.as_object().ok_or(ConfigError::NotAnObject)?;

        let mut file = ConfigFile::default();

        match root.get("settings") {
            None => {}
            Some(Value::Object(map)) => file.settings = map.clone(),
            Some(_) => warnings.push(format!(
                "{} settings region is not an object; using defaults",
                scope.label()
            )),
        }

        match root.get("inserts") {
            None => {}
            Some(Value::Object(map)) => {
                for (name, raw) in map {
                    match parse_insert(name, raw) {
                        Some(insert) => {
                            file.inserts.insert(name.clone(), insert);
                        }
                        None => warnings.push(format!(
                            "{} insert '{}' is not an object; ignored",
                            scope.label(),
                            name
                        )),
                    }
                }
            }
            Some(_) => warnings.push(format!(
                "{} inserts region is not an object; ignored",
                scope.label()
            )),
        }

        match root.get("subscriptions") {
            None => {}
            Some(Value::Array(items)) => {
                for (i, raw) in items.iter().enumerate() {
                    match parse_subscription(raw) {
                        Some(sub) => file.subscriptions.push(sub),
                        None => warnings.push(format!(
                            "{} subscription #{} is not an object; ignored",
                            scope.label(),
                            i + 1
                        )),
                    }
                }
            }
            Some(_) => warnings.push(format!(
                "{} subscriptions region is not an array; ignored",
                scope.label()
            )),
        }

        Ok(file)
    }
}

fn parse_insert(name: &str, raw: &Value) -> Option<Insert> {
    let obj = raw.as_object()?;
    Some(Insert {
        name: name.to_string(),
        text: obj
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        dynamic: obj
            .get("dynamic")
            .and_then(Value::as_str)
            .map(str::to_string),
        conditions: condition_list(obj.get("conditions")),
    })
}

fn parse_subscription(raw: &Value) -> Option<RawSubscription> {
    let obj = raw.as_object()?;
    Some(RawSubscription {
        insert: obj
            .get("insert")
            .and_then(Value::as_str)
            .map(str::to_string),
        pattern: obj.get("on").and_then(Value::as_str).map(str::to_string),
        timing: obj
            .get("timing")
            .and_then(Value::as_str)
            .map(str::to_string),
        enabled: obj.get("enabled").and_then(Value::as_bool).unwrap_or(true),
        inherit_conditions: obj
            .get("inheritConditions")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        conditions: condition_list(obj.get("conditions")),
    })
}

fn condition_list(raw: Option<&Value>) -> Vec<Value> {
    match raw {
        Some(Value::Array(items)) => items.clone(),
        // A single condition object is accepted as a one-element list.
        Some(v @ Value::Object(_)) => vec![v.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tolerates_unknown_top_level_keys() {
        let mut warnings = Vec::new();
        let file = ConfigFile::parse(
            r#"{"version": 9, "settings": {}, "inserts": {}, "subscriptions": []}"#,
            Scope::Project,
            &mut warnings,
        )
        .unwrap();
        assert!(file.inserts.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_object_top_level() {
        let mut warnings = Vec::new();
        let err = ConfigFile::parse("[1, 2]", Scope::Global, &mut warnings);
        assert!(matches!(err, Err(ConfigError::NotAnObject)));
    }

    #[test]
    fn test_parse_skips_malformed_subscription_element() {
        let mut warnings = Vec::new();
        let file = ConfigFile::parse(
            r#"{"subscriptions": ["oops", {"insert": "X", "on": "a:*", "timing": "pre"}]}"#,
            Scope::Project,
            &mut warnings,
        )
        .unwrap();
        assert_eq!(file.subscriptions.len(), 1);
        assert_eq!(file.subscriptions[0].insert.as_deref(), Some("X"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_insert_defaults() {
        let mut warnings = Vec::new();
        let file = ConfigFile::parse(
            r#"{"inserts": {"X": {}}}"#,
            Scope::Project,
            &mut warnings,
        )
        .unwrap();
        let insert = &file.inserts["X"];
        assert_eq!(insert.text, "");
        assert!(insert.dynamic.is_none());
        assert!(insert.conditions.is_empty());
    }

    #[test]
    fn test_timing_closed_set() {
        assert_eq!(Timing::parse("pre"), Some(Timing::Pre));
        assert_eq!(Timing::parse("complete"), Some(Timing::Complete));
        assert_eq!(Timing::parse("during"), None);
    }
}
