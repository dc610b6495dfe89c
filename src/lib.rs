pub mod audio;
pub mod config;
pub mod kernel;
pub mod library;
pub mod services;
pub mod session;

pub use kernel::orchestrator::Orchestrator;
pub use kernel::state::JobState;
