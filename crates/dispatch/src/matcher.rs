use config::model::{Subscription, Timing};

/// Glob-match a subscription pattern against a skill name. The prompt path
/// additionally lets a bare command match a plugin-qualified pattern through
/// the pattern's trailing `:`-segment (`help` matches `superpowers:help`).
pub fn pattern_matches(
    pattern: &str,
    skill: &str,
    prompt_mode: bool,
    warnings: &mut Vec<String>,
) -> bool {
    let Ok(glob) = globset::Glob::new(pattern) else {
        warnings.push(format!("invalid subscription pattern '{}'", pattern));
        return false;
    };
    if glob.compile_matcher().is_match(skill) {
        return true;
    }
    if prompt_mode && !skill.contains(':') {
        if let Some((_, tail)) = pattern.rsplit_once(':') {
            if let Ok(tail_glob) = globset::Glob::new(tail) {
                return tail_glob.compile_matcher().is_match(skill);
            }
        }
    }
    false
}

/// Candidate subscriptions for one skill at one timing, in effective-list
/// order. Completion-timing subscriptions are feature-gated.
pub fn select<'a>(
    subscriptions: &'a [Subscription],
    skill: &str,
    timing: Timing,
    prompt_mode: bool,
    completion_enabled: bool,
    warnings: &mut Vec<String>,
) -> Vec<&'a Subscription> {
    subscriptions
        .iter()
        .filter(|sub| sub.timing == timing)
        .filter(|sub| sub.timing != Timing::Complete || completion_enabled)
        .filter(|sub| pattern_matches(&sub.pattern, skill, prompt_mode, warnings))
        .collect()
}

/// Enforce the per-skill ceiling after condition filtering: keep the first N
/// in list order and warn about the drop.
pub fn apply_ceiling<'a>(
    mut fired: Vec<&'a Subscription>,
    ceiling: u32,
    warnings: &mut Vec<String>,
) -> Vec<&'a Subscription> {
    let ceiling = ceiling as usize;
    if fired.len() > ceiling {
        warnings.push(format!(
            "match ceiling {} reached; dropping {} subscription(s)",
            ceiling,
            fired.len() - ceiling
        ));
        fired.truncate(ceiling);
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::model::Scope;

    fn sub(insert: &str, pattern: &str, timing: Timing) -> Subscription {
        Subscription {
            insert: insert.to_string(),
            pattern: pattern.to_string(),
            timing,
            inherit_conditions: true,
            conditions: Vec::new(),
            scope: Scope::Project,
        }
    }

    #[test]
    fn test_glob_over_full_skill_name() {
        let mut w = Vec::new();
        assert!(pattern_matches("tests:*", "tests:run", false, &mut w));
        assert!(pattern_matches("tests:run", "tests:run", false, &mut w));
        assert!(!pattern_matches("tests:*", "plan:new", false, &mut w));
        assert!(w.is_empty());
    }

    #[test]
    fn test_invalid_pattern_warns_and_never_matches() {
        let mut w = Vec::new();
        assert!(!pattern_matches("tests:[", "tests:run", false, &mut w));
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_prompt_mode_bare_name_matches_trailing_segment() {
        let mut w = Vec::new();
        assert!(pattern_matches(
            "superpowers:writing-plans",
            "writing-plans",
            true,
            &mut w
        ));
        assert!(pattern_matches("superpowers:*", "writing-plans", true, &mut w));
        // Tool path never applies the reduction.
        assert!(!pattern_matches(
            "superpowers:writing-plans",
            "writing-plans",
            false,
            &mut w
        ));
        // A qualified skill name does not get the reduction either.
        assert!(!pattern_matches(
            "superpowers:writing-plans",
            "other:writing-plans",
            true,
            &mut w
        ));
    }

    #[test]
    fn test_select_filters_timing_and_pattern_in_order() {
        let subs = vec![
            sub("A", "tests:*", Timing::Pre),
            sub("B", "tests:run", Timing::Post),
            sub("C", "plan:*", Timing::Pre),
            sub("D", "*", Timing::Pre),
        ];
        let mut w = Vec::new();
        let picked = select(&subs, "tests:run", Timing::Pre, false, false, &mut w);
        let names: Vec<&str> = picked.iter().map(|s| s.insert.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
    }

    #[test]
    fn test_completion_timing_feature_gated() {
        let subs = vec![sub("Y", "plan:*", Timing::Complete)];
        let mut w = Vec::new();
        assert!(select(&subs, "plan:new", Timing::Complete, false, false, &mut w).is_empty());
        assert_eq!(
            select(&subs, "plan:new", Timing::Complete, false, true, &mut w).len(),
            1
        );
    }

    #[test]
    fn test_ceiling_keeps_first_n_and_warns() {
        let subs = vec![
            sub("A", "*", Timing::Pre),
            sub("B", "*", Timing::Pre),
            sub("C", "*", Timing::Pre),
            sub("D", "*", Timing::Pre),
        ];
        let mut w = Vec::new();
        let fired = apply_ceiling(subs.iter().collect(), 3, &mut w);
        let names: Vec<&str> = fired.iter().map(|s| s.insert.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(w[0].contains("ceiling 3"));
        assert!(w[0].contains("1 subscription(s)"));
    }

    #[test]
    fn test_ceiling_not_reached_no_warning() {
        let subs = vec![sub("A", "*", Timing::Pre)];
        let mut w = Vec::new();
        let fired = apply_ceiling(subs.iter().collect(), 3, &mut w);
        assert_eq!(fired.len(), 1);
        assert!(w.is_empty());
    }
}
