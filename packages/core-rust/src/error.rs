//! Classified errors: failures that carry a wire-safe status and message.
//!
//! A [`ClassifiedError`] is raised at the point a failure is detected
//! (validation, authorization, lookup) and is written to the client verbatim.
//! Anything that is *not* a `ClassifiedError` is treated as an unclassified
//! fault by the server crate and never exposed as-is.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::{self, canonical_message, InvalidStatus};

/// Human-readable error message: a single line or an ordered list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Single(String),
    Many(Vec<String>),
}

impl ErrorMessage {
    /// Returns the message lines in order.
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Self::Single(line) => vec![line.as_str()],
            Self::Many(lines) => lines.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(line) => f.write_str(line),
            Self::Many(lines) => f.write_str(&lines.join("; ")),
        }
    }
}

impl From<&str> for ErrorMessage {
    fn from(line: &str) -> Self {
        Self::Single(line.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(line: String) -> Self {
        Self::Single(line)
    }
}

impl From<Vec<String>> for ErrorMessage {
    fn from(lines: Vec<String>) -> Self {
        Self::Many(lines)
    }
}

impl From<&ErrorMessage> for Value {
    fn from(message: &ErrorMessage) -> Self {
        match message {
            ErrorMessage::Single(line) => Value::String(line.clone()),
            ErrorMessage::Many(lines) => {
                Value::Array(lines.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// An expected failure with a status classification, message, and optional detail.
///
/// Immutable once built: the builder-style `with_*` methods consume `self`.
/// Wire shape: `{ "code": <int>, "message": <string|string[]>, "detail": <object|omitted> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ClassifiedError {
    #[serde(with = "status::serde_status")]
    code: StatusCode,
    message: ErrorMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<Map<String, Value>>,
}

impl ClassifiedError {
    /// Creates an error with an explicit message and status.
    pub fn new(message: impl Into<ErrorMessage>, code: StatusCode) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    /// Creates a 500 error with the given message.
    pub fn msg(message: impl Into<ErrorMessage>) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Creates an error whose message is the canonical name of `code`.
    #[must_use]
    pub fn from_status(code: StatusCode) -> Self {
        Self::new(canonical_message(code), code)
    }

    /// Creates an error from a raw numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStatus`] if `code` is not a legal classification.
    pub fn try_new(message: impl Into<ErrorMessage>, code: u16) -> Result<Self, InvalidStatus> {
        Ok(Self::new(message, status::classify(code)?))
    }

    /// Creates an error carrying several message lines.
    ///
    /// With no lines the message is the canonical name of `code`.
    pub fn many<I, S>(messages: I, code: StatusCode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<String> = messages.into_iter().map(Into::into).collect();
        if lines.is_empty() {
            Self::from_status(code)
        } else {
            Self::new(ErrorMessage::Many(lines), code)
        }
    }

    /// 400 carrying one line per failed validation rule.
    pub fn validation<I, S>(errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::many(errors, StatusCode::BAD_REQUEST)
    }

    pub fn bad_request(message: impl Into<ErrorMessage>) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(message: impl Into<ErrorMessage>) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(message: impl Into<ErrorMessage>) -> Self {
        Self::new(message, StatusCode::FORBIDDEN)
    }

    pub fn not_found(message: impl Into<ErrorMessage>) -> Self {
        Self::new(message, StatusCode::NOT_FOUND)
    }

    pub fn conflict(message: impl Into<ErrorMessage>) -> Self {
        Self::new(message, StatusCode::CONFLICT)
    }

    pub fn unprocessable(message: impl Into<ErrorMessage>) -> Self {
        Self::new(message, StatusCode::UNPROCESSABLE_ENTITY)
    }

    pub fn too_many_requests(message: impl Into<ErrorMessage>) -> Self {
        Self::new(message, StatusCode::TOO_MANY_REQUESTS)
    }

    pub fn internal(message: impl Into<ErrorMessage>) -> Self {
        Self::msg(message)
    }

    /// Replaces the detail map.
    #[must_use]
    pub fn with_detail(mut self, detail: Map<String, Value>) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Adds one entry to the detail map, creating it if needed.
    #[must_use]
    pub fn with_detail_entry(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.detail
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn code(&self) -> StatusCode {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &ErrorMessage {
        &self.message
    }

    #[must_use]
    pub fn detail(&self) -> Option<&Map<String, Value>> {
        self.detail.as_ref()
    }

    /// Wire body: `{code, message, detail?}`.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("code".into(), Value::from(self.code.as_u16()));
        body.insert("message".into(), Value::from(&self.message));
        if let Some(detail) = &self.detail {
            body.insert("detail".into(), Value::Object(detail.clone()));
        }
        Value::Object(body)
    }
}

impl Default for ClassifiedError {
    fn default() -> Self {
        Self::from_status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<StatusCode> for ClassifiedError {
    fn from(code: StatusCode) -> Self {
        Self::from_status(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn new_keeps_message_and_code() {
        let err = ClassifiedError::new("Name required", StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), &ErrorMessage::Single("Name required".into()));
        assert!(err.detail().is_none());
    }

    #[test]
    fn default_is_internal_server_error() {
        let err = ClassifiedError::default();
        assert_eq!(err.code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[test]
    fn from_status_derives_canonical_message() {
        let err = ClassifiedError::from_status(StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Not Found");
    }

    #[test]
    fn try_new_rejects_illegal_code() {
        assert_eq!(
            ClassifiedError::try_new("nope", 7).unwrap_err(),
            InvalidStatus(7)
        );
        assert_eq!(
            ClassifiedError::try_new("gone", 410).unwrap().code(),
            StatusCode::GONE
        );
    }

    #[test]
    fn to_body_omits_absent_detail() {
        let err = ClassifiedError::bad_request("Name required");
        assert_eq!(
            err.to_body(),
            json!({ "code": 400, "message": "Name required" })
        );
    }

    #[test]
    fn to_body_includes_detail_entries() {
        let err = ClassifiedError::conflict("Email taken")
            .with_detail_entry("field", "email")
            .with_detail_entry("attempts", 2);
        assert_eq!(
            err.to_body(),
            json!({
                "code": 409,
                "message": "Email taken",
                "detail": { "field": "email", "attempts": 2 }
            })
        );
    }

    #[test]
    fn validation_collects_lines_as_array() {
        let err = ClassifiedError::validation(["name is required", "age must be positive"]);
        assert_eq!(err.code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_body()["message"],
            json!(["name is required", "age must be positive"])
        );
        assert_eq!(err.to_string(), "name is required; age must be positive");
    }

    #[test]
    fn validation_without_lines_uses_canonical_message() {
        let err = ClassifiedError::validation(Vec::<String>::new());
        assert_eq!(err.to_string(), "Bad Request");
    }

    #[test]
    fn many_without_lines_uses_canonical_message() {
        let err = ClassifiedError::many(Vec::<String>::new(), StatusCode::CONFLICT);
        assert_eq!(err.code(), StatusCode::CONFLICT);
        assert_eq!(err.to_body()["message"], json!("Conflict"));
    }

    #[test]
    fn serde_shape_matches_to_body() {
        let err = ClassifiedError::forbidden("no access").with_detail_entry("role", "guest");
        let serialized = serde_json::to_value(&err).unwrap();
        assert_eq!(serialized, err.to_body());

        let parsed: ClassifiedError = serde_json::from_value(serialized).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn deserialize_rejects_illegal_code() {
        let raw = json!({ "code": 12, "message": "bad" });
        assert!(serde_json::from_value::<ClassifiedError>(raw).is_err());
    }

    #[test]
    fn travels_through_anyhow_style_boxing() {
        let boxed: Box<dyn std::error::Error + Send + Sync> =
            Box::new(ClassifiedError::not_found("missing"));
        let back = boxed.downcast::<ClassifiedError>().unwrap();
        assert_eq!(back.code(), StatusCode::NOT_FOUND);
    }

    proptest! {
        #[test]
        fn body_carries_code_and_message_verbatim(code in 100u16..=599, message in ".*") {
            let err = ClassifiedError::try_new(message.clone(), code).unwrap();
            let body = err.to_body();
            prop_assert_eq!(body["code"].as_u64(), Some(u64::from(code)));
            prop_assert_eq!(body["message"].as_str(), Some(message.as_str()));
            prop_assert!(body.get("detail").is_none());
        }
    }
}
