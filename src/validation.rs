// Per-resource body validation, run at the handler boundary before any
// store call. A failure never reaches controller logic.

use serde_json::{Map, Value};

pub type Validator = fn(&Value) -> Result<(), String>;

pub fn user(body: &Value) -> Result<(), String> {
    let obj = object(body)?;
    require_string(obj, "username")?;
    optional_string_array(obj, "perms")
}

pub fn company(body: &Value) -> Result<(), String> {
    let obj = object(body)?;
    require_string(obj, "name")
}

pub fn message(body: &Value) -> Result<(), String> {
    let obj = object(body)?;
    require_string(obj, "text")?;
    optional_string(obj, "by")?;
    optional_string(obj, "to")
}

pub fn session(body: &Value) -> Result<(), String> {
    let obj = object(body)?;
    match obj.get("uid") {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err("field 'uid' must be a string or null".to_string()),
    }
}

pub fn membership(body: &Value) -> Result<(), String> {
    let obj = object(body)?;
    require_string(obj, "user")?;
    require_string(obj, "company")?;
    optional_string_array(obj, "perms")
}

fn object(body: &Value) -> Result<&Map<String, Value>, String> {
    body.as_object()
        .ok_or_else(|| "request body must be a JSON object".to_string())
}

fn require_string(obj: &Map<String, Value>, field: &str) -> Result<(), String> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        _ => Err(format!("field '{}' is required and must be a non-empty string", field)),
    }
}

fn optional_string(obj: &Map<String, Value>, field: &str) -> Result<(), String> {
    match obj.get(field) {
        None | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(format!("field '{}' must be a string", field)),
    }
}

fn optional_string_array(obj: &Map<String, Value>, field: &str) -> Result<(), String> {
    match obj.get(field) {
        None => Ok(()),
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => Ok(()),
        Some(_) => Err(format!("field '{}' must be an array of strings", field)),
    }
}
