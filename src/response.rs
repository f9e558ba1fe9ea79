//! Response inspection: body parsing, poisoned-value detection and defaulted field reads.
//!
//! A leaf scalar is *poisoned* when its textual form is `"NaN"`, `"null"` or empty.
//! Both JSON `null` and the literal strings are treated the same way since the
//! robot-control service is not consistent about how it serializes sentinels.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CalibrationError;
use crate::sanitize;

/// Untyped body returned by a robot-control call.
pub type ApiResponse = Value;

const POISONED_TEXT: [&str; 3] = ["NaN", "null", ""];

/// Parse a response body, accepting bare `NaN` tokens as the string `"NaN"`.
pub fn parse_body(endpoint: &str, text: &str) -> Result<ApiResponse, CalibrationError> {
    let strict_err = match serde_json::from_str::<Value>(text) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    if let Cow::Owned(relaxed) = quote_bare_nan(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&relaxed) {
            log::debug!("{endpoint}: body contained bare NaN tokens");
            return Ok(value);
        }
    }

    Err(CalibrationError::MalformedBody {
        endpoint: endpoint.to_string(),
        reason: strict_err.to_string(),
        preview: sanitize::truncate_chars(text, 512),
    })
}

/// Rewrite `NaN` tokens that appear outside string literals to `"NaN"`.
fn quote_bare_nan(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let mut out: Option<String> = None;
    let mut in_string = false;
    let mut escaped = false;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if b == b'"' {
            in_string = true;
        } else if bytes[i..].starts_with(b"NaN") {
            let buf = out.get_or_insert_with(|| String::with_capacity(input.len() + 8));
            buf.push_str(&input[last..i]);
            buf.push_str("\"NaN\"");
            i += 3;
            last = i;
            continue;
        }
        i += 1;
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&input[last..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(input),
    }
}

/// Textual form of a scalar leaf, as used for poison detection.
fn leaf_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed("null"),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Array(_) | Value::Object(_) => Cow::Borrowed("<container>"),
    }
}

fn is_poisoned_leaf(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
        && POISONED_TEXT.contains(&leaf_text(value).as_ref())
}

/// Result of scanning a response for poisoned leaves.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationVerdict {
    /// JSON-path-like locations of every poisoned leaf, in document order.
    pub poisoned: Vec<String>,
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        self.poisoned.is_empty()
    }

    pub fn poisoned_count(&self) -> usize {
        self.poisoned.len()
    }
}

/// Visit every leaf scalar of `response` and collect the poisoned ones.
pub fn validate(response: &ApiResponse) -> ValidationVerdict {
    let mut poisoned = Vec::new();
    collect_poisoned(response, "$".to_string(), &mut poisoned);
    ValidationVerdict { poisoned }
}

fn collect_poisoned(value: &Value, path: String, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_poisoned(child, format!("{path}.{key}"), out);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                collect_poisoned(child, format!("{path}[{idx}]"), out);
            }
        }
        leaf => {
            if is_poisoned_leaf(leaf) {
                out.push(path);
            }
        }
    }
}

/// Conversion from a (non-poisoned) JSON value into a typed field.
pub trait FieldValue: Sized {
    fn from_json(value: &Value) -> Option<Self>;
}

impl FieldValue for u64 {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FieldValue for f64 {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

impl FieldValue for bool {
    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FieldValue for String {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(_) | Value::Bool(_) => Some(leaf_text(value).into_owned()),
            _ => None,
        }
    }
}

impl FieldValue for Value {
    fn from_json(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

/// Resolve a dotted path (`"a.b.0"`); numeric segments index arrays.
pub fn lookup<'a>(response: &'a ApiResponse, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(response, |node, seg| match node {
            Value::Object(map) => map.get(seg),
            Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Read `path`, substituting `default` when it is absent, poisoned or not convertible.
pub fn read_field<T: FieldValue>(response: &ApiResponse, path: &str, default: T) -> T {
    lookup(response, path)
        .filter(|v| !is_poisoned_leaf(v))
        .and_then(T::from_json)
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    InProgress,
    Success,
    Error,
    /// Any status string the service sent that is not one of the above.
    Unrecognized(String),
}

impl CalibrationStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "in_progress" => Self::InProgress,
            "success" => Self::Success,
            "error" => Self::Error,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Error => "error",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `calibration_status`, defaulting to `Error` when missing or poisoned.
pub fn read_status(response: &ApiResponse) -> CalibrationStatus {
    let raw: String = read_field(response, "calibration_status", "error".to_string());
    CalibrationStatus::parse(&raw)
}

/// Snapshot of one calibration poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub status: CalibrationStatus,
    pub current_step: u64,
    pub total_steps: u64,
    pub message: String,
}

impl CalibrationProgress {
    pub fn from_response(response: &ApiResponse) -> Self {
        Self {
            status: read_status(response),
            current_step: read_field(response, "current_step", 0),
            total_steps: read_field(response, "total_nb_steps", 0),
            message: read_field(response, "message", String::new()),
        }
    }
}

/// Joint angles from a `/joints/read` body; non-numeric entries are skipped.
pub fn read_joints(response: &ApiResponse) -> Vec<f64> {
    lookup(response, "joints")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(f64::from_json).collect())
        .unwrap_or_default()
}
