use serde_json::Value;

/// The closed condition vocabulary. Parsed from raw JSON at evaluation time;
/// anything outside this set is malformed and evaluates to false.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    PathExists { path: String },
    GitBranch { pattern: String },
    EnvSet { name: String },
    EnvEquals { name: String, value: String },
    FileContains { path: String, pattern: String, regex: bool },
    Not(Box<Condition>),
}

/// Parse one raw condition value. `Err` carries the warning text; the caller
/// treats a parse failure as false.
pub fn parse(raw: &Value) -> Result<Condition, String> {
    let Some(obj) = raw.as_object() else {
        return Err(format!("condition body is not an object: {}", compact(raw)));
    };
    let Some(kind) = obj.get("type").and_then(Value::as_str) else {
        return Err("condition has no 'type' field".to_string());
    };

    match kind {
        "path-exists" => Ok(Condition::PathExists {
            path: required_str(obj, "path", kind)?,
        }),
        "git-branch" => Ok(Condition::GitBranch {
            pattern: required_str(obj, "pattern", kind)?,
        }),
        "env-set" => Ok(Condition::EnvSet {
            name: required_str(obj, "name", kind)?,
        }),
        "env-equals" => {
            let name = required_str(obj, "name", kind)?;
            // The comparison value must be declared as a string; a numeric
            // literal is a likely user error and the condition is false.
            match obj.get("value") {
                Some(Value::String(s)) => Ok(Condition::EnvEquals {
                    name,
                    value: s.clone(),
                }),
                Some(other) => Err(format!(
                    "env-equals value for '{}' must be a string, got {}",
                    name,
                    compact(other)
                )),
                None => Err(format!("env-equals for '{}' has no 'value' field", name)),
            }
        }
        "file-contains" => Ok(Condition::FileContains {
            path: required_str(obj, "path", kind)?,
            pattern: required_str(obj, "pattern", kind)?,
            regex: obj.get("regex").and_then(Value::as_bool).unwrap_or(false),
        }),
        "not" => match obj.get("condition") {
            Some(inner @ Value::Object(_)) => Ok(Condition::Not(Box::new(parse(inner)?))),
            Some(other) => Err(format!(
                "negation must wrap a condition object, got {}",
                compact(other)
            )),
            None => Err("negation has no 'condition' field".to_string()),
        },
        other => Err(format!("unknown condition type '{}'", other)),
    }
}

fn required_str(
    obj: &serde_json::Map<String, Value>,
    field: &str,
    kind: &str,
) -> Result<String, String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("{} condition is missing string field '{}'", kind, field))
}

fn compact(v: &Value) -> String {
    let s = v.to_string();
    if s.chars().count() > 60 {
        let head: String = s.chars().take(60).collect();
        format!("{}…", head)
    } else {
        s
    }
}
