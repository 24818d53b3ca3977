use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use crate::core::{
    domain::{ExecutionRequest, ExecutionResult, FailureKind, LanguageSpec},
    registry::LanguageRegistry,
    traits::{
        runner::{Invocation, ProcessRunner, RunOutcome},
        workspace::{Workspace, WorkspaceError},
    },
};

/// Entry point for running one submission.
///
/// `execute` is total: every failure, including unsupported languages and
/// filesystem errors, comes back as a failed [`ExecutionResult`].
#[derive(Debug)]
pub struct ExecutionService {
    registry: LanguageRegistry,
    workspace: Arc<dyn Workspace>,
    runner: Arc<dyn ProcessRunner>,
    default_timeout: Duration,
    permits: Semaphore,
}

impl ExecutionService {
    pub fn new(
        registry: LanguageRegistry,
        workspace: Arc<dyn Workspace>,
        runner: Arc<dyn ProcessRunner>,
        default_timeout: Duration,
        max_concurrent_executions: usize,
    ) -> Self {
        Self {
            registry,
            workspace,
            runner,
            default_timeout,
            permits: Semaphore::new(max_concurrent_executions),
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    #[tracing::instrument(skip(self, request), fields(language = %request.language))]
    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let spec = match self.registry.resolve(&request.language) {
            Ok(spec) => spec,
            Err(e) => {
                tracing::debug!("Rejected request: {}", e);
                return ExecutionResult::failed(FailureKind::UnsupportedLanguage, e.to_string(), 0);
            }
        };

        let started = Instant::now();

        // Waiting for a slot is part of the measured time.
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!(error = %e, "execution permits closed");
                return ExecutionResult::failed(
                    FailureKind::Internal,
                    e.to_string(),
                    started.elapsed().as_millis() as u64,
                );
            }
        };

        let outcome = self.run_in_workspace(spec, request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(outcome) => {
                tracing::debug!(elapsed_ms, "Execution finished: {:?}", outcome.termination);
                (outcome, elapsed_ms).into()
            }
            Err(e) => {
                tracing::error!(error = %e, elapsed_ms, "code execution failed");
                ExecutionResult::failed(FailureKind::Internal, e.to_string(), elapsed_ms)
            }
        }
    }

    async fn run_in_workspace(
        &self,
        spec: &LanguageSpec,
        request: &ExecutionRequest,
    ) -> Result<RunOutcome, WorkspaceError> {
        let file = self
            .workspace
            .create(&request.source_code, spec.file_extension)
            .await?;

        let invocation = Invocation {
            program: spec.launch_command.clone(),
            args: spec.args_for(file.path()),
            stdin: request.stdin.clone(),
            timeout: request
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(self.default_timeout),
        };

        tracing::debug!(execution_id = %file.id(), "running submission");
        let outcome = self.runner.run(&invocation).await;

        self.workspace.release(file).await;
        Ok(outcome)
    }
}

impl From<(RunOutcome, u64)> for ExecutionResult {
    fn from((outcome, elapsed_ms): (RunOutcome, u64)) -> Self {
        let failure = outcome.termination.failure();
        ExecutionResult {
            succeeded: failure.is_none(),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            elapsed_ms,
            failure,
        }
    }
}
