//! Diff display

use colored::Colorize;
use declarative::{DiffAction, DiffSummary, PropertyChange, ResourceDiff, Value, group_by_type};

/// Render a value for display; lists and maps are pretty-printed JSON.
fn render(value: &Value) -> String {
    match value {
        Value::List(_) | Value::Map(_) => {
            serde_json::to_string_pretty(&value.to_json()).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}

fn is_structured(value: &Value) -> bool {
    matches!(value, Value::List(_) | Value::Map(_))
}

/// Lines describing one property change, without the box prefix
pub fn change_lines(change: &PropertyChange) -> Vec<String> {
    let Some(current) = &change.current else {
        let desired = render(&change.desired);
        let mut lines = desired.lines();
        let first = lines.next().unwrap_or_default();
        let mut out = vec![format!("{}: {}", change.property, first)];
        out.extend(lines.map(|l| format!("  {l}")));
        return out;
    };

    if !is_structured(&change.desired) && !is_structured(current) {
        return vec![format!(
            "{}: {} → {}",
            change.property,
            render(current).red(),
            render(&change.desired).green()
        )];
    }

    let before = render(current);
    let after = render(&change.desired);
    let diff = similar::TextDiff::from_lines(&before, &after);

    let mut out = vec![format!("{}:", change.property)];
    for line in diff.iter_all_changes() {
        let text = line.value().trim_end();
        match line.tag() {
            similar::ChangeTag::Delete => out.push(format!("  {}", format!("- {text}").red())),
            similar::ChangeTag::Insert => out.push(format!("  {}", format!("+ {text}").green())),
            similar::ChangeTag::Equal => out.push(format!("    {}", text.dimmed())),
        }
    }
    out
}

/// Display pending changes grouped by type
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Sensu Diff".bold()
    );
    println!("│");

    for (resource_type, type_diffs) in group_by_type(diffs) {
        println!("│ {}", resource_type.bold());

        for diff in type_diffs {
            let (symbol, note) = match diff.action {
                DiffAction::Create => ("+".green(), "(will create)"),
                DiffAction::Update => ("~".yellow(), "(will update)"),
                DiffAction::Destroy => ("-".red(), "(will remove)"),
            };
            println!(
                "│   {} {:<30} {} {}",
                symbol,
                diff.key,
                note.dimmed(),
                format!("[{}]", diff.provider).dimmed()
            );
            for change in &diff.changes {
                for line in change_lines(change) {
                    println!("│       {line}");
                }
            }
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to create, {} to update, {} to remove)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_change_is_one_line() {
        let lines = change_lines(&PropertyChange {
            property: "interval".to_string(),
            current: Some(Value::Int(10)),
            desired: Value::Int(60),
        });
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("interval: "));
        assert!(lines[0].contains("10"));
        assert!(lines[0].contains("60"));
    }

    #[test]
    fn test_new_property() {
        let lines = change_lines(&PropertyChange {
            property: "command".to_string(),
            current: None,
            desired: Value::Str("check-cpu.sh".to_string()),
        });
        assert_eq!(lines, vec!["command: \"check-cpu.sh\"".to_string()]);
    }

    #[test]
    fn test_list_change_shows_line_diff() {
        let lines = change_lines(&PropertyChange {
            property: "subjects".to_string(),
            current: Some(Value::List(vec![json!("admin")])),
            desired: Value::List(vec![json!("admin"), json!("ops")]),
        });
        assert_eq!(lines[0], "subjects:");
        assert!(lines.iter().any(|l| l.contains("+   \"ops\"")));
        assert!(lines.iter().any(|l| l.contains("-   \"admin\"")));
    }
}
