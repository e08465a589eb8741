//! Job requests read from JSON files

/// Read and validate job request messages
pub mod message;

/// Find job request files on disk
pub mod read;

/// Load the embedded JSON schema for job requests
pub mod schema;

pub use message::{FileSpec, JobRequest, JobSpec, Message, MessageError};
