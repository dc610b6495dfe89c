pub mod error;
pub mod job;
pub mod orchestrator;
pub mod state;
pub mod status;
