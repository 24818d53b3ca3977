/// Native module contains implementations of core traits
/// that run submissions as ordinary child processes on this host,
/// without Docker or any other container runtime.
pub mod runner;
pub mod sandbox;
pub mod workspace;

use std::sync::Arc;

use crate::{
    config::ExecutionConfig,
    core::{registry::LanguageRegistry, service::ExecutionService},
    native::{runner::NativeRunner, workspace::TempWorkspace},
};

/// Wires an [`ExecutionService`] backed by the host's interpreters.
pub fn execution_service(config: &ExecutionConfig) -> ExecutionService {
    ExecutionService::new(
        LanguageRegistry::new(&config.interpreters),
        Arc::new(TempWorkspace::new(&config.temp_dir)),
        Arc::new(NativeRunner::new(
            config.max_output_chars,
            config.sandbox.clone(),
        )),
        config.default_timeout(),
        config.max_concurrent_executions,
    )
}
