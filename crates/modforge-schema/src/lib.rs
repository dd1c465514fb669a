//! Generation request validation.
//!
//! Requests are first checked structurally against the emitted JSON Schema,
//! then rule by rule against the entity catalog. Rule failures are collected
//! into a [`ValidationReport`] instead of stopping at the first one.

pub mod defaults;
pub mod errors;
pub mod schema;
pub mod validate;

pub use defaults::{DEFAULT_PHONE_REGION, DefaultContext, DefaultRules, phone_pattern};
pub use errors::{IssueSeverity, Result, SchemaError, ValidationIssue, ValidationReport};
pub use schema::{request_json_schema, request_schema_value};
pub use validate::{
    ValidatedRequest, ValidationOptions, lifecycle_columns, validate_descriptor,
    validate_request, validate_request_json,
};
