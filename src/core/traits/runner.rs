use std::ffi::OsString;
use std::time::Duration;

use crate::core::domain::FailureKind;

/// Everything needed to launch one child process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub stdin: Option<String>,
    pub timeout: Duration,
}

/// Terminal state of a single run. Exactly one is reached per invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    Exited { code: Option<i32> },
    TimedOut { limit: Duration },
    OutputOverflowed { limit_chars: usize },
    LaunchFailed { msg: String },
}

impl Termination {
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Termination::Exited { code: Some(0) } => None,
            Termination::Exited { .. } => Some(FailureKind::NonZeroExit),
            Termination::TimedOut { .. } => Some(FailureKind::Timeout),
            Termination::OutputOverflowed { .. } => Some(FailureKind::OutputOverflow),
            Termination::LaunchFailed { .. } => Some(FailureKind::LaunchFailure),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOutcome {
    pub termination: Termination,
    pub stdout: String,
    pub stderr: Option<String>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.termination.failure().is_none()
    }
}

#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessRunner: std::fmt::Debug + Send + Sync {
    /// Runs the invocation to a terminal state. Never fails: every problem is
    /// reported through [`Termination`].
    async fn run(&self, invocation: &Invocation) -> RunOutcome;
}
