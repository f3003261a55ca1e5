//! Request body schemas: per-field rules checked before a handler runs.

use crate::config::ValidationRule;
use crate::error::AppError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Body schema. In partial mode (used for updates) `required` is not enforced for absent fields.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    rules: HashMap<String, ValidationRule>,
    partial: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: HashMap<String, ValidationRule>) -> Self {
        Schema { rules, partial: false }
    }

    pub fn field(mut self, name: impl Into<String>, rule: ValidationRule) -> Self {
        self.rules.insert(name.into(), rule);
        self
    }

    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn validate(&self, body: &Map<String, Value>) -> Result<(), AppError> {
        if self.partial {
            for (col, v) in body {
                if let Some(rule) = self.rules.get(col) {
                    validate_field(col, v, rule)?;
                }
            }
            return Ok(());
        }
        // Sorted so the first reported failure is stable.
        let mut cols: Vec<_> = self.rules.keys().collect();
        cols.sort();
        for col in cols {
            let rule = &self.rules[col];
            let val = body.get(col);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", col)));
            }
            if let Some(v) = val {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    match format.to_lowercase().as_str() {
        "email" => {
            if let Some(s) = v.as_str() {
                if !s.contains('@') || s.len() < 3 {
                    return Err(AppError::Validation(format!("{} must be a valid email", col)));
                }
            }
        }
        "uuid" => {
            if let Some(s) = v.as_str() {
                if uuid::Uuid::parse_str(s).is_err() {
                    return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn product_schema() -> Schema {
        Schema::new()
            .field("name", ValidationRule { max_length: Some(5), ..ValidationRule::required() })
            .field("price", ValidationRule { minimum: Some(0.0), ..Default::default() })
    }

    #[test]
    fn required_field_missing() {
        let err = product_schema().validate(&body(json!({ "price": 1 }))).unwrap_err();
        assert_eq!(err.to_string(), "validation: name is required");
    }

    #[test]
    fn partial_skips_required() {
        assert!(product_schema().partial().validate(&body(json!({ "price": 1 }))).is_ok());
        assert!(product_schema().partial().validate(&body(json!({ "price": -1 }))).is_err());
    }

    #[test]
    fn bounds_and_lengths() {
        assert!(product_schema().validate(&body(json!({ "name": "lamp", "price": 3 }))).is_ok());
        assert!(product_schema().validate(&body(json!({ "name": "lampshade" }))).is_err());
        assert!(product_schema().validate(&body(json!({ "name": "lamp", "price": -3 }))).is_err());
    }

    #[test]
    fn allowed_and_format() {
        let schema = Schema::new()
            .field("kind", ValidationRule { allowed: Some(vec![json!("a"), json!(2)]), ..Default::default() })
            .field("email", ValidationRule { format: Some("email".into()), ..Default::default() });
        assert!(schema.validate(&body(json!({ "kind": 2.0, "email": "a@b.c" }))).is_ok());
        assert!(schema.validate(&body(json!({ "kind": "z" }))).is_err());
        assert!(schema.validate(&body(json!({ "email": "nope" }))).is_err());
    }
}
