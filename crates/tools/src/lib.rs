//! Tool invocation for the voice engine
//!
//! The executor projects an assistant's configured tools into JSON-schema
//! descriptors for the LLM and routes requested invocations to built-in
//! control actions, knowledge retrieval, or user-defined HTTP functions.

mod executor;
mod schema;

pub use executor::{KnowledgeRetriever, ToolExecutor, FUNCTION_TIMEOUT};
pub use schema::validate_function_schema;
