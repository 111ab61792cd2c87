use anyhow::{Context, Result};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Runs `command` to completion within `timeout`. The child is killed if the
/// timeout fires or the calling future is dropped.
pub async fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<Output> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    command.kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .with_context(|| format!("{} timed out after {}s", program, timeout.as_secs()))?
        .with_context(|| format!("Failed to run {}", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "{} exited with {}: {}",
            program,
            output.status,
            stderr.trim().chars().take(500).collect::<String>()
        );
    }

    Ok(output)
}

/// Whether `program` can be spawned at all. Some tools print their version to
/// stderr with a non-zero exit, so only the spawn result matters.
pub fn is_command_available(program: &str, version_arg: &str) -> bool {
    std::process::Command::new(program)
        .arg(version_arg)
        .output()
        .is_ok()
}
