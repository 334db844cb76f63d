use lambda_deploy_core::preflight::{run_checklist, ToolRequirement};
use lambda_deploy_core::stages::Stage;
use serde_json::json;

use crate::adapters::tools::ToolProbe;
use crate::error::DeployError;
use crate::logging::{log_error, log_info};
use crate::stages::StageOutcome;

const COMPONENT: &str = "preflight";

pub fn run_preflight(
    tools: &[ToolRequirement],
    probe: &dyn ToolProbe,
) -> Result<StageOutcome, DeployError> {
    let report = run_checklist(tools, |program| probe.version(program));

    for tool in &report.tools {
        log_info(
            COMPONENT,
            "tool_checked",
            json!({
                "program": tool.program.clone(),
                "found": tool.found,
                "required": tool.required,
                "version": tool.version.clone(),
            }),
        );
    }

    if let Some(missing) = report.missing_required().next() {
        log_error(
            COMPONENT,
            "required_tool_missing",
            json!({ "program": missing.program.clone() }),
        );
        return Err(DeployError::MissingTool {
            tool: missing.program.clone(),
            remediation: missing.remediation.clone().unwrap_or_default(),
        });
    }

    let found = report.tools.iter().filter(|tool| tool.found).count();
    Ok(StageOutcome::new(
        Stage::Preflight,
        format!("{found}/{} tools available", report.tools.len()),
        json!(report),
    ))
}

#[cfg(test)]
mod tests {
    use lambda_deploy_core::preflight::DEFAULT_TOOLS;

    use super::*;

    struct FixedProbe(&'static [&'static str]);

    impl ToolProbe for FixedProbe {
        fn version(&self, program: &str) -> Option<String> {
            self.0
                .contains(&program)
                .then(|| format!("{program} 1.0.0"))
        }
    }

    #[test]
    fn missing_docker_is_fatal_with_remediation() {
        let error = run_preflight(&DEFAULT_TOOLS, &FixedProbe(&["aws", "python3"]))
            .expect_err("docker is required");
        match error {
            DeployError::MissingTool { tool, remediation } => {
                assert_eq!(tool, "docker");
                assert!(remediation.contains("install Docker"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn reports_checklist_when_docker_present() {
        let outcome = run_preflight(&DEFAULT_TOOLS, &FixedProbe(&["docker"]))
            .expect("docker alone is enough");
        assert_eq!(outcome.summary, "1/3 tools available");
        assert_eq!(outcome.detail["tools"][0]["found"], true);
    }
}
