use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    Python,
    TypeScript,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::JavaScript, Language::Python, Language::TypeScript];

    pub fn id(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::TypeScript => "typescript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|language| language.id() == s)
            .ok_or(())
    }
}

/// Launch recipe for one language: which binary runs a source file and how.
#[derive(Clone, Debug)]
pub struct LanguageSpec {
    pub language: Language,
    pub file_extension: &'static str,
    pub launch_command: OsString,
    pub build_args: fn(&Path) -> Vec<OsString>,
}

impl LanguageSpec {
    pub fn args_for(&self, source: &Path) -> Vec<OsString> {
        (self.build_args)(source)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language: String,
    #[serde(default)]
    pub stdin: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(source_code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            source_code: source_code.into(),
            language: language.into(),
            stdin: None,
            timeout_ms: None,
        }
    }

    pub fn with_stdin(self, stdin: impl Into<String>) -> Self {
        Self {
            stdin: Some(stdin.into()),
            ..self
        }
    }

    pub fn with_timeout_ms(self, timeout_ms: u64) -> Self {
        Self {
            timeout_ms: Some(timeout_ms),
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedLanguage,
    LaunchFailure,
    Timeout,
    OutputOverflow,
    NonZeroExit,
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub succeeded: bool,
    pub stdout: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ExecutionResult {
    pub fn failed(kind: FailureKind, msg: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: Some(msg.into()),
            elapsed_ms,
            failure: Some(kind),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_hidden: bool,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            is_hidden: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub passed: bool,
    pub input: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunSummary {
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<TestCaseResult>,
}

impl TestRunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    /// Percentage of passed cases, rounded to the nearest integer.
    pub fn pass_rate(&self) -> u32 {
        if self.total() == 0 {
            return 0;
        }
        ((self.passed as f64 / self.total() as f64) * 100.0).round() as u32
    }

    pub fn record(&mut self, result: TestCaseResult) {
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Passed,
    Failed,
    Error,
    Timeout,
}

impl From<&ExecutionResult> for SubmissionStatus {
    fn from(result: &ExecutionResult) -> Self {
        match (result.succeeded, result.failure) {
            (true, _) => SubmissionStatus::Passed,
            (false, Some(FailureKind::Timeout)) => SubmissionStatus::Timeout,
            (false, Some(FailureKind::NonZeroExit | FailureKind::OutputOverflow)) => {
                SubmissionStatus::Failed
            }
            (false, _) => SubmissionStatus::Error,
        }
    }
}

/// What the surrounding API persists for a single run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub language: String,
    pub status: SubmissionStatus,
    pub result: ExecutionResult,
}

impl Submission {
    pub fn record(request: &ExecutionRequest, result: ExecutionResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            language: request.language.clone(),
            status: (&result).into(),
            result,
        }
    }
}
