//! Path templates: literal segments and typed `<name:type>` captures.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown capture type '{ty}' in segment '{segment}'")]
    UnknownType { segment: String, ty: String },
    #[error("malformed capture '{0}' (expected <name:type>)")]
    MalformedCapture(String),
    #[error("duplicate capture name '{0}'")]
    DuplicateCapture(String),
}

/// Type of a captured path segment. A segment that does not parse makes the route not match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// Signed 64-bit integer (`number` or `int`).
    Number,
    Float,
    String,
    Uuid,
    Bool,
}

impl ParamType {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "number" | "int" | "integer" => ParamType::Number,
            "float" => ParamType::Float,
            "string" | "str" => ParamType::String,
            "uuid" => ParamType::Uuid,
            "bool" | "boolean" => ParamType::Bool,
            _ => return None,
        })
    }

    pub fn parse(self, raw: &str) -> Option<Value> {
        match self {
            ParamType::Number => raw.parse::<i64>().ok().map(Value::from),
            ParamType::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            ParamType::String => Some(Value::String(raw.to_string())),
            ParamType::Uuid => uuid::Uuid::parse_str(raw).ok().map(|u| Value::String(u.to_string())),
            ParamType::Bool => match raw {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Capture { name: String, ty: ParamType },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// Non-empty segments of a path; leading, trailing and repeated slashes are ignored.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl PathTemplate {
    pub fn parse(template: &str) -> Result<Self, RouteError> {
        let mut segments = Vec::new();
        for seg in split_path(template) {
            let Some(inner) = seg.strip_prefix('<').and_then(|s| s.strip_suffix('>')) else {
                if seg.contains('<') || seg.contains('>') {
                    return Err(RouteError::MalformedCapture(seg.to_string()));
                }
                segments.push(Segment::Literal(seg.to_string()));
                continue;
            };
            let (name, ty_name) = inner.split_once(':').unwrap_or((inner, "string"));
            if name.is_empty() {
                return Err(RouteError::MalformedCapture(seg.to_string()));
            }
            let ty = ParamType::from_name(ty_name).ok_or_else(|| RouteError::UnknownType {
                segment: seg.to_string(),
                ty: ty_name.to_string(),
            })?;
            let duplicate = segments
                .iter()
                .any(|s| matches!(s, Segment::Capture { name: n, .. } if n == name));
            if duplicate {
                return Err(RouteError::DuplicateCapture(name.to_string()));
            }
            segments.push(Segment::Capture {
                name: name.to_string(),
                ty,
            });
        }
        Ok(PathTemplate {
            raw: template.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Typed params when `path` matches segment for segment, else `None`.
    pub fn matches(&self, path: &str) -> Option<Map<String, Value>> {
        let mut params = Map::new();
        let mut parts = split_path(path);
        for seg in &self.segments {
            let part = parts.next()?;
            match seg {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Capture { name, ty } => {
                    params.insert(name.clone(), ty.parse(part)?);
                }
            }
        }
        if parts.next().is_some() {
            return None;
        }
        Some(params)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
