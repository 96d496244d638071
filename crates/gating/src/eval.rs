use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::condition::{self, Condition};
use crate::git;

/// Largest file the file-contains probe will read.
const MAX_PROBE_BYTES: u64 = 1024 * 1024;
/// Longest pattern accepted by file-contains, bounding regex compilation.
const MAX_PATTERN_CHARS: usize = 500;

/// Where the current branch comes from. `Fixed` lets tests evaluate the
/// git-branch condition without a repository on disk.
#[derive(Debug, Clone)]
pub enum BranchSource {
    Detect,
    Fixed(Option<String>),
}

/// The environment one dispatch evaluates conditions against.
#[derive(Debug, Clone)]
pub struct EvalContext {
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
    pub branch: BranchSource,
    pub home: Option<PathBuf>,
}

impl EvalContext {
    pub fn from_process(cwd: &Path) -> Self {
        EvalContext {
            cwd: cwd.to_path_buf(),
            env: std::env::vars().collect(),
            branch: BranchSource::Detect,
            home: dirs::home_dir(),
        }
    }

    fn branch(&self) -> Option<String> {
        match &self.branch {
            BranchSource::Detect => git::current_branch(&self.cwd),
            BranchSource::Fixed(b) => b.clone(),
        }
    }

    /// Resolve a condition path: `~` expands to home, relative paths resolve
    /// against the working directory.
    fn resolve_path(&self, raw: &str) -> PathBuf {
        if let Some(rest) = raw.strip_prefix("~/") {
            if let Some(home) = &self.home {
                return home.join(rest);
            }
        } else if raw == "~" {
            if let Some(home) = &self.home {
                return home.clone();
            }
        }
        let p = PathBuf::from(raw);
        if p.is_absolute() {
            p
        } else {
            self.cwd.join(p)
        }
    }
}

/// Evaluate one raw condition value. Total: never raises; any internal
/// failure becomes false, warning only where it likely indicates user error.
pub fn evaluate(raw: &Value, ctx: &EvalContext, warnings: &mut Vec<String>) -> bool {
    match condition::parse(raw) {
        Ok(cond) => evaluate_parsed(&cond, ctx, warnings),
        Err(why) => {
            warnings.push(format!("malformed condition ({}); treated as false", why));
            false
        }
    }
}

fn evaluate_parsed(cond: &Condition, ctx: &EvalContext, warnings: &mut Vec<String>) -> bool {
    match cond {
        Condition::PathExists { path } => ctx.resolve_path(path).exists(),
        Condition::GitBranch { pattern } => match ctx.branch() {
            Some(branch) => glob_match(pattern, &branch, warnings),
            None => false,
        },
        Condition::EnvSet { name } => ctx.env.get(name).is_some_and(|v| !v.is_empty()),
        Condition::EnvEquals { name, value } => {
            // Missing variables compare as the empty string.
            ctx.env.get(name).map(String::as_str).unwrap_or("") == value
        }
        Condition::FileContains {
            path,
            pattern,
            regex,
        } => file_contains(ctx, path, pattern, *regex, warnings),
        Condition::Not(inner) => {
            if matches!(inner.as_ref(), Condition::Not(_)) {
                warnings.push("double negation in condition; consider flattening".to_string());
            }
            !evaluate_parsed(inner, ctx, warnings)
        }
    }
}

/// Evaluate a condition list in declaration order, stopping at the first
/// false. Returns the index of the failing condition, if any.
pub fn first_failure(
    conditions: &[Value],
    ctx: &EvalContext,
    warnings: &mut Vec<String>,
) -> Option<usize> {
    conditions
        .iter()
        .position(|raw| !evaluate(raw, ctx, warnings))
}

fn glob_match(pattern: &str, candidate: &str, warnings: &mut Vec<String>) -> bool {
    match globset::Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher().is_match(candidate),
        Err(_) => {
            warnings.push(format!("invalid glob pattern '{}'", pattern));
            false
        }
    }
}

fn file_contains(
    ctx: &EvalContext,
    path: &str,
    pattern: &str,
    use_regex: bool,
    warnings: &mut Vec<String>,
) -> bool {
    if pattern.chars().count() > MAX_PATTERN_CHARS {
        warnings.push(format!(
            "file-contains pattern exceeds {} characters; treated as false",
            MAX_PATTERN_CHARS
        ));
        return false;
    }
    if path.starts_with('.') && !path.starts_with("./") && !path.starts_with("..") {
        warnings.push(format!(
            "file-contains probes dot file '{}' (possible secret file)",
            path
        ));
    }

    let resolved = ctx.resolve_path(path);
    let Ok(meta) = std::fs::metadata(&resolved) else {
        return false;
    };
    if meta.len() > MAX_PROBE_BYTES {
        warnings.push(format!(
            "file-contains target '{}' is larger than 1 MiB; treated as false",
            path
        ));
        return false;
    }
    let Ok(bytes) = std::fs::read(&resolved) else {
        return false;
    };
    // Binary content is tolerated: decode with replacement.
    let content = String::from_utf8_lossy(&bytes);

    if use_regex {
        match regex::Regex::new(pattern) {
            Ok(re) => re.is_match(&content),
            Err(_) => {
                warnings.push(format!("invalid regex '{}'; treated as false", pattern));
                false
            }
        }
    } else {
        content.contains(pattern)
    }
}
