//! Data translators: rename and reshape fields when a request crosses from
//! one protocol's data shape into another's.

use core::AppError;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    StringToInt,
    Json,
}

#[derive(Debug, Clone)]
pub struct TranslationRule {
    pub source_path: String,
    pub target_path: String,
    pub transform: Transform,
}

impl TranslationRule {
    pub fn new(source_path: impl Into<String>, target_path: impl Into<String>, transform: Transform) -> Self {
        Self { source_path: source_path.into(), target_path: target_path.into(), transform }
    }
}

/// Applies `rules` to `input`, an object whose top-level keys are the rules'
/// source paths, producing a new object keyed by the rules' target paths.
pub fn translate(rules: &[TranslationRule], input: &Value) -> Result<Value, AppError> {
    let mut output = serde_json::Map::new();
    for rule in rules {
        let Some(value) = input.get(&rule.source_path) else { continue };
        let transformed = apply_transform(rule.transform, value)?;
        output.insert(rule.target_path.clone(), transformed);
    }
    Ok(Value::Object(output))
}

fn apply_transform(transform: Transform, value: &Value) -> Result<Value, AppError> {
    match transform {
        Transform::Identity => Ok(value.clone()),
        Transform::StringToInt => match value {
            Value::String(s) => match s.as_str() {
                "true" => Ok(Value::from(1)),
                "false" => Ok(Value::from(0)),
                other => other
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| AppError::InvalidRequest {
                        field: "translation".to_string(),
                        reason: format!("cannot convert '{other}' to int"),
                    }),
            },
            Value::Number(_) => Ok(value.clone()),
            _ => Err(AppError::InvalidRequest {
                field: "translation".to_string(),
                reason: "string_to_int requires a string or number input".to_string(),
            }),
        },
        Transform::Json => match value {
            Value::String(s) => serde_json::from_str(s).map_err(AppError::Serialization),
            other => Ok(other.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passes_the_value_through() {
        let rules = vec![TranslationRule::new("a", "b", Transform::Identity)];
        let input = serde_json::json!({"a": "hello"});
        let output = translate(&rules, &input).unwrap();
        assert_eq!(output["b"], serde_json::json!("hello"));
    }

    #[test]
    fn string_to_int_accepts_true_and_false() {
        assert_eq!(apply_transform(Transform::StringToInt, &Value::from("true")).unwrap(), Value::from(1));
        assert_eq!(apply_transform(Transform::StringToInt, &Value::from("false")).unwrap(), Value::from(0));
    }

    #[test]
    fn string_to_int_rejects_non_numeric_strings() {
        let result = apply_transform(Transform::StringToInt, &Value::from("not-a-number"));
        assert!(result.is_err());
    }

    #[test]
    fn json_transform_parses_embedded_json_strings() {
        let rules = vec![TranslationRule::new("a", "b", Transform::Json)];
        let input = serde_json::json!({"a": "{\"x\": 1}"});
        let output = translate(&rules, &input).unwrap();
        assert_eq!(output["b"], serde_json::json!({"x": 1}));
    }
}
