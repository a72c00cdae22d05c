//! Command-template implementation of the `RemoteExecutor` port.
//!
//! Renders `executor.program` / `executor.args` for one call and runs the
//! result through a local `CommandRunner`. The rendered arguments are passed
//! to the program directly; no local shell re-splits them.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{CommandRunner, ExecOutput, RemoteExecutor};
use crate::domain::settings::ExecutorSettings;

pub const HOST_PLACEHOLDER: &str = "{host}";
pub const ENV_PLACEHOLDER: &str = "{env}";
pub const COMMAND_PLACEHOLDER: &str = "{command}";

pub struct TemplateExecutor<R: CommandRunner> {
    runner: R,
    template: ExecutorSettings,
}

impl<R: CommandRunner> TemplateExecutor<R> {
    pub fn new(runner: R, template: ExecutorSettings) -> Self {
        Self { runner, template }
    }

    /// Argument vector for one call. `{command}` is substituted last so a
    /// command that happens to contain `{host}` is passed through verbatim.
    #[must_use]
    pub fn render_args(&self, host: &str, environment: &str, command: &str) -> Vec<String> {
        self.template
            .args
            .iter()
            .map(|arg| {
                arg.replace(HOST_PLACEHOLDER, host)
                    .replace(ENV_PLACEHOLDER, environment)
                    .replace(COMMAND_PLACEHOLDER, command)
            })
            .collect()
    }
}

impl<R: CommandRunner> RemoteExecutor for TemplateExecutor<R> {
    async fn execute(
        &self,
        host: &str,
        environment: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput> {
        let args = self.render_args(host, environment, command);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run(&self.template.program, &argv, timeout)
            .await?;
        let output = ExecOutput::from(output);
        tracing::debug!(
            host,
            environment,
            exit_code = output.exit_code,
            stdout_len = output.stdout.len(),
            "remote command finished"
        );
        Ok(output)
    }
}
