//! One JSON object per line on stderr, so stdout stays free for reports.

use serde_json::{json, Value};

pub fn log_info(component: &str, event: &str, details: Value) {
    eprintln!("{}", log_line(component, None, event, details));
}

pub fn log_warn(component: &str, event: &str, details: Value) {
    eprintln!("{}", log_line(component, Some("warn"), event, details));
}

pub fn log_error(component: &str, event: &str, details: Value) {
    eprintln!("{}", log_line(component, Some("error"), event, details));
}

fn log_line(component: &str, level: Option<&str>, event: &str, details: Value) -> Value {
    let mut line = json!({
        "component": component,
        "event": event,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "details": details,
    });
    if let Some(level) = level {
        line["level"] = Value::from(level);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_lines_omit_level() {
        let line = log_line("registry", None, "repository_found", json!({"name": "repo"}));
        assert_eq!(line["component"], "registry");
        assert!(line.get("level").is_none());
        assert_eq!(line["details"]["name"], "repo");
    }

    #[test]
    fn error_lines_carry_level() {
        let line = log_line("push", Some("error"), "push_failed", json!({}));
        assert_eq!(line["level"], "error");
        assert!(line["timestamp"].as_str().is_some());
    }
}
