//! Command executor - runs a task's shell command to completion
//!
//! Output goes straight to the terminal; only the exit status is inspected.

use crate::error::UpdateError;
use anyhow::Result;
use std::path::Path;
use tokio::process::Command;

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Run `command` through the platform shell in `cwd`
pub async fn run_command(command: &str, cwd: &Path, env: &[(&str, String)]) -> Result<()> {
    if command.trim().is_empty() {
        anyhow::bail!("Empty command");
    }

    log::info!("Running `{}` in {}", command, cwd.display());

    let status = shell(command)
        .current_dir(cwd)
        .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| UpdateError::io(cwd, e))?;

    if status.success() {
        log::debug!("`{}` completed", command);
        Ok(())
    } else {
        let code = status.code().unwrap_or(-1);
        log::warn!("`{}` failed (exit: {})", command, code);
        Err(UpdateError::CommandFailed {
            command: command.to_string(),
            code,
        }
        .into())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_command_runs_in_cwd_with_env() {
        let dir = TempDir::new().unwrap();
        let env = [("UPDATER_NAME", "foo".to_string())];

        run_command("echo \"$UPDATER_NAME\" > out.txt", dir.path(), &env)
            .await
            .unwrap();

        let out = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
        assert_eq!(out.trim(), "foo");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = run_command("exit 3", dir.path(), &[]).await.unwrap_err();

        match err.downcast_ref::<UpdateError>() {
            Some(UpdateError::CommandFailed { code, .. }) => assert_eq!(*code, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_command() {
        let dir = TempDir::new().unwrap();
        assert!(run_command("  ", dir.path(), &[]).await.is_err());
    }
}
