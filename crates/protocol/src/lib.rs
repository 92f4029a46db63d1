//! Wire types for the sequence upload API.
//!
//! Everything the orchestrator needs to speak to the service lives here:
//! endpoint paths and form field names ([`constants`]), the response
//! envelope ([`messages`]) and the application status decoding
//! ([`status`]).

pub mod constants;
pub mod messages;
pub mod status;

// Re-export primary types for convenience.
pub use constants::{ApiEndpoints, Command};
pub use messages::{ApiResponse, RemoteSequence};
pub use status::{StatusCode, interpret};
