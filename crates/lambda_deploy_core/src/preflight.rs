use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolRequirement {
    pub program: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub remediation: &'static str,
}

pub const DEFAULT_TOOLS: [ToolRequirement; 3] = [
    ToolRequirement {
        program: "docker",
        description: "container engine used to build and push the image",
        required: true,
        remediation: "install Docker (https://docs.docker.com/get-docker/) and make sure the daemon is running",
    },
    ToolRequirement {
        program: "aws",
        description: "AWS CLI, useful for manual console-side steps",
        required: false,
        remediation: "install the AWS CLI v2 and run `aws configure`",
    },
    ToolRequirement {
        program: "python3",
        description: "runs the service test-suite locally",
        required: false,
        remediation: "install Python 3.10+",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub program: String,
    pub description: String,
    pub required: bool,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreflightReport {
    pub tools: Vec<ToolStatus>,
}

impl PreflightReport {
    pub fn missing_required(&self) -> impl Iterator<Item = &ToolStatus> {
        self.tools.iter().filter(|tool| tool.required && !tool.found)
    }

    pub fn passed(&self) -> bool {
        self.missing_required().next().is_none()
    }
}

/// Probes every tool. `probe` returns the first line of `<tool> --version`,
/// or `None` when the tool cannot be run.
pub fn run_checklist(
    tools: &[ToolRequirement],
    mut probe: impl FnMut(&str) -> Option<String>,
) -> PreflightReport {
    let tools = tools
        .iter()
        .map(|tool| {
            let version = probe(tool.program);
            let found = version.is_some();
            ToolStatus {
                program: tool.program.to_string(),
                description: tool.description.to_string(),
                required: tool.required,
                found,
                version,
                remediation: (!found).then(|| tool.remediation.to_string()),
            }
        })
        .collect();
    PreflightReport { tools }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_tool_still_passes() {
        let report = run_checklist(&DEFAULT_TOOLS, |program| {
            (program == "docker").then(|| "Docker version 27.0.3".to_string())
        });

        assert!(report.passed());
        let aws = &report.tools[1];
        assert!(!aws.found);
        assert!(aws.remediation.is_some());
    }

    #[test]
    fn missing_docker_fails() {
        let report = run_checklist(&DEFAULT_TOOLS, |_| None);
        assert!(!report.passed());
        let missing: Vec<_> = report.missing_required().map(|t| t.program.as_str()).collect();
        assert_eq!(missing, vec!["docker"]);
    }
}
