pub mod runner;
pub mod workspace;
