pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 100_000;
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 16;

pub const TRUNCATION_MARKER: &str = "\n...[output truncated]";
pub const OUTPUT_EXCEEDED_MSG: &str = "Output exceeded maximum size";

pub const SOURCE_FILE_PREFIX: &str = "exec_";

/// Host variables a child process may see. Everything else is dropped.
pub const INHERITED_ENV_VARS: &[&str] =
    &["PATH", "HOME", "LANG", "LC_ALL", "TMPDIR", "SYSTEMROOT"];

pub const READ_CHUNK_SIZE: usize = 8 * 1024;
