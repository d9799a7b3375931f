//! Prompt text for the task-specific operations.

pub fn explain(code: &str) -> String {
    format!("Please explain this code:\n\n{code}")
}

pub fn suggest(task: &str) -> String {
    format!("Suggest a command for: {task}")
}

pub fn debug(code: &str, error: &str, context: Option<&str>) -> String {
    let context_line = context
        .map(|context| format!("Context: {context}"))
        .unwrap_or_default();
    format!(
        "I'm getting an error and need help debugging:

Error: {error}

Code:
```
{code}
```

{context_line}

Please help me:
1. Identify the root cause
2. Explain why the error is happening
3. Provide a fix
4. Suggest how to prevent similar errors"
    )
}

pub fn refactor(code: &str, goal: Option<&str>) -> String {
    let goal = goal.map(|goal| format!(" to {goal}")).unwrap_or_default();
    format!(
        "Please refactor this code{goal}:

```
{code}
```

Provide:
1. Refactored code
2. Explanation of changes
3. Benefits of the refactoring
4. Any trade-offs or considerations"
    )
}

pub fn review(code: &str, focus_areas: &[String]) -> String {
    let focus = if focus_areas.is_empty() {
        String::new()
    } else {
        format!("Focus areas: {}", focus_areas.join(", "))
    };
    format!(
        "Please review the following code and provide feedback on:
1. Code quality and style
2. Potential bugs or issues
3. Performance considerations
4. Security concerns
5. Best practices

Code:
```
{code}
```

{focus}

Provide specific, actionable feedback."
    )
}

pub fn test_generate(code: &str, framework: Option<&str>) -> String {
    match framework {
        Some(framework) => format!("Generate {framework} tests for this code:\n\n{code}"),
        None => format!("Generate unit tests for this code:\n\n{code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_prompts() {
        assert_eq!(explain("fn a() {}"), "Please explain this code:\n\nfn a() {}");
        assert_eq!(suggest("list ports"), "Suggest a command for: list ports");
        assert_eq!(
            test_generate("x", Some("pytest")),
            "Generate pytest tests for this code:\n\nx"
        );
        assert_eq!(test_generate("x", None), "Generate unit tests for this code:\n\nx");
    }

    #[test]
    fn debug_includes_context_only_when_given() {
        let with = debug("let x = 1;", "boom", Some("runs in CI"));
        assert!(with.contains("Error: boom"));
        assert!(with.contains("```\nlet x = 1;\n```"));
        assert!(with.contains("Context: runs in CI"));

        let without = debug("let x = 1;", "boom", None);
        assert!(!without.contains("Context:"));
        assert!(without.ends_with("4. Suggest how to prevent similar errors"));
    }

    #[test]
    fn refactor_goal_is_optional() {
        assert!(refactor("x", Some("improve readability"))
            .starts_with("Please refactor this code to improve readability:"));
        assert!(refactor("x", None).starts_with("Please refactor this code:"));
    }

    #[test]
    fn review_lists_focus_areas() {
        let prompt = review("x", &["security".to_string(), "performance".to_string()]);
        assert!(prompt.contains("Focus areas: security, performance"));
        assert!(!review("x", &[]).contains("Focus areas"));
    }
}
