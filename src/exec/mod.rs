use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::errors::{AssistantError, AssistantResult};

#[derive(Debug, Clone)]
pub struct CmdResult {
    pub command: String,
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u128,
}

impl CmdResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Resolve an external tool on PATH (or an explicit path).
pub fn locate(program: &str) -> AssistantResult<PathBuf> {
    which::which(program).map_err(|e| AssistantError::Tool(format!("{program} not found: {e}")))
}

/// Run `program args...`, feeding `stdin` and capturing both output streams.
pub fn run_tool(program: &str, args: &[&str], stdin: &str) -> AssistantResult<CmdResult> {
    let bin = locate(program)?;
    let command = std::iter::once(program).chain(args.iter().copied()).collect::<Vec<_>>().join(" ");
    let started = Instant::now();

    let mut child = Command::new(bin)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AssistantError::Tool(format!("failed to spawn {command}: {e}")))?;

    if let Some(mut input) = child.stdin.take() {
        input.write_all(stdin.as_bytes())?;
        // dropping closes the pipe so the tool sees EOF
    }

    let out = child.wait_with_output()?;
    let res = CmdResult {
        command,
        status: out.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        duration_ms: started.elapsed().as_millis(),
    };
    tracing::debug!(command = %res.command, status = res.status, ms = res.duration_ms as u64, "tool finished");
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_a_tool_error() {
        let err = run_tool("definitely-not-a-real-binary-4821", &[], "").unwrap_err();
        assert!(matches!(err, AssistantError::Tool(_)));
    }

    #[cfg(unix)]
    #[test]
    fn stdin_reaches_the_tool() {
        let res = run_tool("cat", &[], "digraph G { A -> B; }").unwrap();
        assert!(res.success());
        assert_eq!(res.stdout, "digraph G { A -> B; }");
    }
}
