pub mod domain;
pub mod harness;
pub mod registry;
pub mod service;
pub mod traits;
