//! Client for the remote music generation service (https://docs.sunoapi.org/).
//!
//! Bearer-token auth. Jobs are submitted, then polled through `record-info`
//! until a terminal status; results are fetched from the returned audio URL.

pub mod client;
pub mod types;

pub use client::{ClientError, GenerationClient, SunoClient};
pub use types::{AddVocalsRequest, GenerateRequest, Model, SubmitRequest, TaskPhase, TaskStatus};
