//! Status classification helpers.
//!
//! Classification codes are plain `http::StatusCode` values. This module only
//! adds the checks and lookups the error model and envelopes need on top of it.

use http::StatusCode;

/// Reason phrase used for legal codes that have no canonical name.
pub const UNKNOWN_STATUS_MESSAGE: &str = "Unknown Status";

/// A raw code that is not a legal status classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid status classification: {0}")]
pub struct InvalidStatus(pub u16);

/// Validates a raw numeric code.
///
/// # Errors
///
/// Returns [`InvalidStatus`] if `code` is outside the legal `100..=999` range.
pub fn classify(code: u16) -> Result<StatusCode, InvalidStatus> {
    StatusCode::from_u16(code).map_err(|_| InvalidStatus(code))
}

/// Like [`classify`], but maps illegal input to 500.
#[must_use]
pub fn classify_or_internal(code: u16) -> StatusCode {
    classify(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Canonical human-readable name of a status, e.g. `"Not Found"` for 404.
#[must_use]
pub fn canonical_message(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or(UNKNOWN_STATUS_MESSAGE)
}

/// Serde adapter encoding a `StatusCode` as its bare number.
pub mod serde_status {
    use http::StatusCode;
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serializes the status as a `u16`.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(status.as_u16())
    }

    /// Deserializes a `u16` and rejects illegal codes.
    ///
    /// # Errors
    ///
    /// Fails if the input is not a number in the legal status range.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatusCode, D::Error> {
        let raw = u16::deserialize(deserializer)?;
        StatusCode::from_u16(raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_accepts_legal_codes() {
        assert_eq!(classify(404), Ok(StatusCode::NOT_FOUND));
        assert_eq!(classify(201), Ok(StatusCode::CREATED));
    }

    #[test]
    fn classify_rejects_out_of_range_codes() {
        assert_eq!(classify(0), Err(InvalidStatus(0)));
        assert_eq!(classify(1000), Err(InvalidStatus(1000)));
    }

    #[test]
    fn classify_or_internal_clamps_to_500() {
        assert_eq!(classify_or_internal(42), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(classify_or_internal(409), StatusCode::CONFLICT);
    }

    #[test]
    fn canonical_message_uses_reason_phrase() {
        assert_eq!(canonical_message(StatusCode::BAD_REQUEST), "Bad Request");
        assert_eq!(canonical_message(StatusCode::OK), "OK");
    }

    #[test]
    fn canonical_message_falls_back_for_unnamed_codes() {
        let unnamed = StatusCode::from_u16(599).unwrap();
        assert_eq!(canonical_message(unnamed), UNKNOWN_STATUS_MESSAGE);
    }
}
