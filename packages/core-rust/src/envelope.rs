//! Success envelopes: "this is the final response" values returned by handlers.
//!
//! Wire shapes:
//! - single result: `{ "code", "message", "data" }`
//! - paginated result: `{ "code", "message", "data", "meta" }`
//! - message only: `{ "code", "message" }`

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::canonical_message;

/// Pagination metadata attached to list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// 1-based page index.
    pub page: u64,
    pub per_page: u64,
    /// Total number of items across all pages.
    pub total: u64,
    pub total_pages: u64,
}

impl PageMeta {
    /// Builds page metadata, deriving `total_pages` from `total` and `per_page`.
    #[must_use]
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }

    fn to_value(self) -> Value {
        // Four integer fields; serialization cannot fail.
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// A response a handler has fully decided on.
///
/// Consumed once by the handler adapter, which sets the wire status to
/// [`Envelope::code`] and writes [`Envelope::to_body`].
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Single {
        code: StatusCode,
        message: String,
        data: Value,
    },
    Paginated {
        code: StatusCode,
        message: String,
        data: Value,
        meta: Value,
    },
    Message {
        code: StatusCode,
        message: String,
    },
}

impl Envelope {
    /// 200 with `data`.
    pub fn ok(data: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    /// 201 with `data`.
    pub fn created(data: impl Into<Value>) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    /// Single result with an explicit status and the status' canonical message.
    pub fn with_status(code: StatusCode, data: impl Into<Value>) -> Self {
        Self::Single {
            code,
            message: canonical_message(code).to_string(),
            data: data.into(),
        }
    }

    /// Single result built from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `data` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(code: StatusCode, data: &T) -> serde_json::Result<Self> {
        Ok(Self::with_status(code, serde_json::to_value(data)?))
    }

    /// 200 list result with pagination metadata.
    pub fn paginated(data: impl Into<Value>, meta: PageMeta) -> Self {
        Self::Paginated {
            code: StatusCode::OK,
            message: canonical_message(StatusCode::OK).to_string(),
            data: data.into(),
            meta: meta.to_value(),
        }
    }

    /// Status and message without a `data` field.
    pub fn message_only(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Message {
            code,
            message: message.into(),
        }
    }

    /// Replaces the message.
    #[must_use]
    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        match self {
            Self::Single { code, data, .. } => Self::Single {
                code,
                message,
                data,
            },
            Self::Paginated {
                code, data, meta, ..
            } => Self::Paginated {
                code,
                message,
                data,
                meta,
            },
            Self::Message { code, .. } => Self::Message { code, message },
        }
    }

    /// Attaches arbitrary metadata, turning the envelope into a paginated one.
    ///
    /// Message-only envelopes gain a `null` data field.
    #[must_use]
    pub fn with_meta(self, meta: Map<String, Value>) -> Self {
        let meta = Value::Object(meta);
        match self {
            Self::Single {
                code,
                message,
                data,
            }
            | Self::Paginated {
                code,
                message,
                data,
                ..
            } => Self::Paginated {
                code,
                message,
                data,
                meta,
            },
            Self::Message { code, message } => Self::Paginated {
                code,
                message,
                data: Value::Null,
                meta,
            },
        }
    }

    #[must_use]
    pub fn code(&self) -> StatusCode {
        match self {
            Self::Single { code, .. } | Self::Paginated { code, .. } | Self::Message { code, .. } => {
                *code
            }
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Single { message, .. }
            | Self::Paginated { message, .. }
            | Self::Message { message, .. } => message,
        }
    }

    /// Primary payload, if the variant carries one.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Single { data, .. } | Self::Paginated { data, .. } => Some(data),
            Self::Message { .. } => None,
        }
    }

    #[must_use]
    pub fn meta(&self) -> Option<&Value> {
        match self {
            Self::Paginated { meta, .. } => Some(meta),
            _ => None,
        }
    }

    /// Wire body for this envelope.
    #[must_use]
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("code".into(), Value::from(self.code().as_u16()));
        body.insert("message".into(), Value::String(self.message().to_string()));
        if let Some(data) = self.data() {
            body.insert("data".into(), data.clone());
        }
        if let Some(meta) = self.meta() {
            body.insert("meta".into(), meta.clone());
        }
        Value::Object(body)
    }
}

impl Serialize for Envelope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_body().serialize(serializer)
    }
}
