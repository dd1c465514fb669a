use modforge_core::GenerateRequest;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde_json::Value;

use crate::errors::Result;

/// Emit the JSON Schema for generation requests.
pub fn request_json_schema() -> RootSchema {
    schema_for!(GenerateRequest)
}

/// The request JSON Schema as a JSON value, ready for compilation.
pub fn request_schema_value() -> Result<Value> {
    Ok(serde_json::to_value(request_json_schema())?)
}
