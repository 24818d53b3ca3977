use std::time::Duration;

use crate::core::traits::runner::{Invocation, ProcessRunner, RunOutcome};

/// Answers every invocation with the same outcome after a fixed delay.
#[derive(Debug, Clone)]
pub struct RunnerStub {
    outcome: RunOutcome,
    delay: Duration,
}

impl RunnerStub {
    pub fn new(outcome: RunOutcome, delay: Duration) -> Self {
        Self { outcome, delay }
    }
}

#[async_trait::async_trait]
impl ProcessRunner for RunnerStub {
    #[tracing::instrument]
    async fn run(&self, invocation: &Invocation) -> RunOutcome {
        tracing::debug!(
            "Start execution: program={:?}, args={:?}, stdin={:?}",
            invocation.program,
            invocation.args,
            invocation.stdin
        );
        tokio::time::sleep(self.delay).await;
        tracing::debug!("Execution result: {:?}", self.outcome);

        self.outcome.clone()
    }
}
