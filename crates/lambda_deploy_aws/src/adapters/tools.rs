use std::process::Command;

pub trait ToolProbe {
    /// First line of `<program> --version`, or `None` if it cannot be run.
    fn version(&self, program: &str) -> Option<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandToolProbe;

impl ToolProbe for CommandToolProbe {
    fn version(&self, program: &str) -> Option<String> {
        let output = Command::new(program).arg("--version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        stdout
            .lines()
            .chain(stderr.lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}
