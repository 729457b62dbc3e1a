//! kubectl-mtv invocation through the command executor

use std::path::{Path, PathBuf};

use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::executor::{CommandExecutor, CommandOutput};
use crate::flags::ToolCommand;

/// Runs kubectl-mtv with the resolved endpoint and credential arguments in front
#[derive(Debug, Clone)]
pub struct CliRunner {
    executor: CommandExecutor,
    binary: PathBuf,
    base_args: Vec<String>,
}

impl CliRunner {
    pub fn new(binary: impl Into<PathBuf>, base_args: Vec<String>, executor: CommandExecutor) -> Self {
        Self {
            executor,
            binary: binary.into(),
            base_args,
        }
    }

    pub fn from_config(config: &HarnessConfig, executor: CommandExecutor) -> Self {
        Self::new(config.cli.binary.clone(), config.base_cli_args(), executor)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn base_args(&self) -> &[String] {
        &self.base_args
    }

    /// Same runner with a different bearer token
    pub fn with_token(&self, token: &str) -> Self {
        let mut base_args: Vec<String> = self
            .base_args
            .iter()
            .filter(|a| !a.starts_with("--token="))
            .cloned()
            .collect();
        base_args.push(format!("--token={}", token));
        Self {
            executor: self.executor.clone(),
            binary: self.binary.clone(),
            base_args,
        }
    }

    /// Run a validated command; a nonzero exit is returned, not raised
    pub async fn run(&self, command: &ToolCommand) -> HarnessResult<CommandOutput> {
        self.run_args(command.cli_args()).await
    }

    /// Run raw words, for commands outside the validated set
    pub async fn run_raw(&self, words: &[&str]) -> HarnessResult<CommandOutput> {
        self.run_args(words.iter().map(|w| w.to_string()).collect()).await
    }

    async fn run_args(&self, args: Vec<String>) -> HarnessResult<CommandOutput> {
        let mut argv = Vec::with_capacity(1 + self.base_args.len() + args.len());
        argv.push(self.binary.to_string_lossy().into_owned());
        argv.extend(self.base_args.iter().cloned());
        argv.extend(args);
        self.executor.run_default(&argv).await
    }
}

/// Whether `binary` resolves to an existing file, directly or through `PATH`
pub fn binary_available(binary: &Path) -> bool {
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn echo_runner() -> CliRunner {
        CliRunner::new(
            "echo",
            vec!["--server=https://api.example.test:6443".to_string(), "--token=old".to_string()],
            CommandExecutor::new(Duration::from_secs(10)),
        )
    }

    #[tokio::test]
    async fn test_base_args_precede_command() {
        let cmd = ToolCommand::new("get plan")
            .unwrap()
            .flag("name", "p1")
            .unwrap()
            .flag("namespace", "demo")
            .unwrap();
        let out = echo_runner().run(&cmd).await.unwrap();
        assert_eq!(
            out.stdout.trim(),
            "--server=https://api.example.test:6443 --token=old get plan p1 --namespace demo"
        );
    }

    #[tokio::test]
    async fn test_with_token_replaces_credential() {
        let runner = echo_runner().with_token("bogus");
        assert_eq!(runner.base_args().len(), 2);
        let out = runner.run_raw(&["version"]).await.unwrap();
        assert!(out.stdout.contains("--token=bogus"));
        assert!(!out.stdout.contains("--token=old"));
    }

    #[test]
    fn test_binary_available() {
        assert!(binary_available(Path::new("sh")));
        assert!(!binary_available(Path::new("definitely-not-a-real-binary-7f3a")));
        assert!(!binary_available(Path::new("/nonexistent/kubectl-mtv")));
    }
}
