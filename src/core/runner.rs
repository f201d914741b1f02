//! Process execution primitives with consistent output capture.

use std::path::Path;
use std::process::Command;

use serde::Serialize;

/// Captured output from a finished process.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Error text for a failed command: stderr, falling back to stdout.
    pub fn error_text(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }

    /// Last `limit` lines of the error text, for surfacing in errors
    /// without dumping a full compiler log.
    pub fn tail(&self, limit: usize) -> String {
        let lines: Vec<&str> = self.error_text().lines().rev().take(limit).collect();
        lines.into_iter().rev().collect::<Vec<_>>().join("\n")
    }
}

/// Capability interface for running external toolchains.
///
/// The builder depends on this seam so tests can substitute a recording
/// fake instead of invoking real compilers and packagers.
pub trait ProcessRunner {
    fn run(&self, program: &str, args: &[&str], dir: &Path, env: &[(String, String)])
        -> CommandOutput;
}

/// Runs commands on the host with captured output.
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        dir: &Path,
        env: &[(String, String)],
    ) -> CommandOutput {
        let result = Command::new(program)
            .args(args)
            .current_dir(dir)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output();

        match result {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput {
                stdout: String::new(),
                stderr: format!("Command error: {}", e),
                success: false,
                exit_code: -1,
            },
        }
    }
}

/// Render a command line for error details.
pub fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
