use jsonschema::JSONSchema;
use serde_json::Value;

use crate::request::message::MessageError;

/// Compile the job request schema shipped with the crate
pub fn load_schema() -> Result<JSONSchema, MessageError> {
    static SCHEMA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/schema/job_request.json"));
    let json: Value = serde_json::from_str(SCHEMA).map_err(|_| MessageError::JSONDecodeError)?;
    JSONSchema::compile(&json).map_err(|err| MessageError::SchemaError(err.to_string()))
}
