use serde::Serialize;

/// The host's hook-response envelope, written as one JSON line on stdout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub additional_context: String,
}

/// Compose the response line. Texts join in firing order separated by blank
/// lines; empty texts contribute nothing. `None` means pass through: empty
/// stdout, exit zero.
pub fn render(
    event_name: &str,
    texts: &[String],
    echo: Option<String>,
    warnings: &[String],
) -> Option<String> {
    let context = texts
        .iter()
        .filter(|t| !t.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut system_lines: Vec<String> = Vec::new();
    if let Some(echo) = echo {
        system_lines.push(echo);
    }
    system_lines.extend(warnings.iter().cloned());

    if context.is_empty() && system_lines.is_empty() {
        return None;
    }

    let response = HookResponse {
        hook_specific_output: (!context.is_empty()).then(|| HookSpecificOutput {
            hook_event_name: event_name.to_string(),
            additional_context: context,
        }),
        system_message: (!system_lines.is_empty()).then(|| system_lines.join("\n")),
    };
    serde_json::to_string(&response).ok()
}

/// One-line summary of what fired, for the system-visible echo.
pub fn echo_line(fired: &[String], skipped: &[String], show_skips: bool) -> String {
    let mut line = format!("{} sub(s) matched ({})", fired.len(), fired.join(", "));
    if show_skips && !skipped.is_empty() {
        line.push_str(&format!("; skipped: ({})", skipped.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dispatch_renders_nothing() {
        assert!(render("PreToolUse", &[], None, &[]).is_none());
        assert!(render("PreToolUse", &[String::new()], None, &[]).is_none());
    }

    #[test]
    fn test_texts_join_with_blank_lines_skipping_empties() {
        let line = render(
            "PreToolUse",
            &["A".to_string(), String::new(), "B".to_string()],
            None,
            &[],
        )
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            v["hookSpecificOutput"]["additionalContext"],
            serde_json::json!("A\n\nB")
        );
        assert_eq!(v["hookSpecificOutput"]["hookEventName"], "PreToolUse");
        assert!(v.get("systemMessage").is_none());
    }

    #[test]
    fn test_warnings_only_response_has_no_context_region() {
        let line = render("UserPromptSubmit", &[], None, &["careful".to_string()]).unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert!(v.get("hookSpecificOutput").is_none());
        assert_eq!(v["systemMessage"], "careful");
    }

    #[test]
    fn test_echo_and_warnings_share_system_message() {
        let line = render(
            "PreToolUse",
            &["PRIOR".to_string()],
            Some("1 sub(s) matched (X)".to_string()),
            &["heads up".to_string()],
        )
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["systemMessage"], "1 sub(s) matched (X)\nheads up");
    }

    #[test]
    fn test_echo_line_formats() {
        assert_eq!(
            echo_line(&["X".to_string()], &[], false),
            "1 sub(s) matched (X)"
        );
        assert_eq!(
            echo_line(
                &["X".to_string(), "Y".to_string()],
                &["Z".to_string()],
                true
            ),
            "2 sub(s) matched (X, Y); skipped: (Z)"
        );
        assert_eq!(
            echo_line(&["X".to_string()], &["Z".to_string()], false),
            "1 sub(s) matched (X)"
        );
    }
}
