use std::sync::Arc;

use crate::core::{
    domain::{ExecutionRequest, TestCase, TestCaseResult, TestRunSummary},
    service::ExecutionService,
};

/// Grades a submission against test cases, one execution per case.
#[derive(Debug, Clone)]
pub struct TestHarness {
    service: Arc<ExecutionService>,
}

impl TestHarness {
    pub fn new(service: Arc<ExecutionService>) -> Self {
        Self { service }
    }

    /// Runs every case in order, never stopping early. Cases run one at a
    /// time so a single validation holds at most one child process.
    #[tracing::instrument(skip(self, code, test_cases), fields(cases = test_cases.len()))]
    pub async fn validate(
        &self,
        code: &str,
        language: &str,
        test_cases: &[TestCase],
    ) -> TestRunSummary {
        let mut summary = TestRunSummary::default();

        for (idx, test_case) in test_cases.iter().enumerate() {
            let request = ExecutionRequest::new(code, language).with_stdin(test_case.input.clone());
            let result = self.service.execute(&request).await;

            let actual = result.stdout.trim();
            let expected = test_case.expected_output.trim();
            let passed = actual == expected;

            tracing::debug!(
                "Test {} {}: succeeded={}, elapsed_ms={}",
                idx,
                if passed { "passed" } else { "failed" },
                result.succeeded,
                result.elapsed_ms
            );

            summary.record(TestCaseResult {
                passed,
                input: test_case.input.clone(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }

        tracing::info!(
            passed = summary.passed,
            failed = summary.failed,
            "validation finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::core::{
        registry::LanguageRegistry,
        traits::{
            runner::{MockProcessRunner, RunOutcome, Termination},
            workspace::{MockWorkspace, SourceFile},
        },
    };

    fn echo_runner() -> MockProcessRunner {
        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(|invocation| RunOutcome {
            termination: Termination::Exited { code: Some(0) },
            stdout: invocation.stdin.clone().unwrap_or_default().trim().to_string(),
            stderr: None,
        });
        runner
    }

    fn harness(runner: MockProcessRunner, expected_runs: usize) -> TestHarness {
        let mut workspace = MockWorkspace::new();
        workspace
            .expect_create()
            .times(expected_runs)
            .returning(|_, _| {
                Ok(SourceFile::new(
                    Uuid::new_v4(),
                    PathBuf::from("/nonexistent/codeview/exec.js"),
                ))
            });
        workspace
            .expect_release()
            .times(expected_runs)
            .return_const(());

        TestHarness::new(Arc::new(ExecutionService::new(
            LanguageRegistry::default(),
            Arc::new(workspace),
            Arc::new(runner),
            Duration::from_secs(10),
            1,
        )))
    }

    #[tokio::test]
    async fn test_echo_program_against_mixed_cases() {
        let harness = harness(echo_runner(), 2);
        let cases = vec![TestCase::new("1", "1"), TestCase::new("2", "3")];

        let summary = harness.validate("echo", "javascript", &cases).await;

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            summary.results[1],
            TestCaseResult {
                passed: false,
                input: "2".to_string(),
                expected: "3".to_string(),
                actual: "2".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_expected_output_is_trimmed_only() {
        let harness = harness(echo_runner(), 2);
        let cases = vec![
            TestCase::new("hello", "  hello\n"),
            TestCase::new("a  b", "a b"),
        ];

        let summary = harness.validate("echo", "python", &cases).await;

        assert!(summary.results[0].passed);
        assert_eq!(summary.results[0].expected, "hello");
        // Inner whitespace is significant.
        assert!(!summary.results[1].passed);
    }

    #[tokio::test]
    async fn test_failing_cases_do_not_abort_run() {
        let mut runner = MockProcessRunner::new();
        let mut seq = mockall::Sequence::new();
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(RunOutcome {
                termination: Termination::Exited { code: Some(1) },
                stdout: String::new(),
                stderr: Some("ReferenceError".to_string()),
            });
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(RunOutcome {
                termination: Termination::TimedOut {
                    limit: Duration::from_secs(10),
                },
                stdout: String::new(),
                stderr: Some("Execution timed out after 10000ms".to_string()),
            });
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .return_const(RunOutcome {
                termination: Termination::Exited { code: Some(0) },
                stdout: "3".to_string(),
                stderr: None,
            });

        let harness = harness(runner, 3);
        let cases = vec![
            TestCase::new("1", "1"),
            TestCase::new("2", "2"),
            TestCase::new("3", "3"),
        ];

        let summary = harness.validate("broken", "javascript", &cases).await;

        assert_eq!(summary.total(), cases.len());
        assert_eq!(summary.results.len(), cases.len());
        for (result, case) in summary.results.iter().zip(&cases) {
            assert_eq!(result.input, case.input);
        }
        assert_eq!(
            summary.results.iter().map(|r| r.passed).collect::<Vec<_>>(),
            vec![false, false, true]
        );
    }

    #[tokio::test]
    async fn test_unsupported_language_fails_every_case() {
        let mut workspace = MockWorkspace::new();
        workspace.expect_create().never();
        let harness = TestHarness::new(Arc::new(ExecutionService::new(
            LanguageRegistry::default(),
            Arc::new(workspace),
            Arc::new(MockProcessRunner::new()),
            Duration::from_secs(10),
            1,
        )));
        let cases = vec![TestCase::new("", ""), TestCase::new("x", "y")];

        let summary = harness.validate("x", "cobol", &cases).await;

        // Empty expected output matches the empty stdout of a failed run.
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_no_cases() {
        let harness = harness(MockProcessRunner::new(), 0);

        let summary = harness.validate("x", "python", &[]).await;

        assert_eq!(summary, TestRunSummary::default());
    }
}
