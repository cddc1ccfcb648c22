//! Function-schema validation
//!
//! User-defined tools carry arbitrary JSON-schema objects which the engine
//! passes through to vendors untouched. A schema-of-schemas check at
//! configuration time keeps malformed definitions out of the LLM request.

use serde_json::Value;

use voice_engine_core::EngineError;

/// Validate a function tool's parameter schema.
///
/// Accepted shape: an object with `"type": "object"`, an optional
/// `properties` object, and an optional `required` array of strings that
/// only names declared properties.
pub fn validate_function_schema(name: &str, schema: &Value) -> Result<(), EngineError> {
    let obj = schema.as_object().ok_or_else(|| {
        EngineError::Validation(format!("tool {name}: parameters must be an object"))
    })?;

    match obj.get("type").and_then(|t| t.as_str()) {
        Some("object") => {}
        _ => {
            return Err(EngineError::Validation(format!(
                "tool {name}: parameters.type must be \"object\""
            )))
        }
    }

    let properties = match obj.get("properties") {
        None => None,
        Some(p) => Some(p.as_object().ok_or_else(|| {
            EngineError::Validation(format!("tool {name}: properties must be an object"))
        })?),
    };

    if let Some(required) = obj.get("required") {
        let names = required.as_array().ok_or_else(|| {
            EngineError::Validation(format!("tool {name}: required must be an array"))
        })?;
        for entry in names {
            let field = entry.as_str().ok_or_else(|| {
                EngineError::Validation(format!("tool {name}: required entries must be strings"))
            })?;
            let declared = properties.map(|p| p.contains_key(field)).unwrap_or(false);
            if !declared {
                return Err(EngineError::Validation(format!(
                    "tool {name}: required field {field} is not declared in properties"
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_object_schema() {
        assert!(validate_function_schema("t", &json!({"type": "object"})).is_ok());
    }

    #[test]
    fn accepts_properties_and_required() {
        let schema = json!({
            "type": "object",
            "properties": { "orderId": { "type": "string" } },
            "required": ["orderId"],
        });
        assert!(validate_function_schema("t", &schema).is_ok());
    }

    #[test]
    fn rejects_non_object_type() {
        assert!(validate_function_schema("t", &json!({"type": "string"})).is_err());
        assert!(validate_function_schema("t", &json!("nope")).is_err());
    }

    #[test]
    fn rejects_undeclared_required_field() {
        let schema = json!({
            "type": "object",
            "properties": {},
            "required": ["ghost"],
        });
        let err = validate_function_schema("lookup", &schema).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}
