pub mod config;
pub mod console;
pub mod orchestrator;
pub mod provider;
