//! Failure signals carried from handlers to the error terminator.

use std::any::Any;
use std::fmt;

use routekit_core::ClassifiedError;

/// A value handed to the failure path.
///
/// The split is made once, by exact type: a [`ClassifiedError`] (directly,
/// or boxed inside an `anyhow::Error`) becomes `Classified`, anything else is
/// an unclassified `Fault`. Neither variant wraps or rewrites the original
/// value.
#[derive(Debug)]
pub enum Failure {
    Classified(ClassifiedError),
    Fault(anyhow::Error),
}

impl Failure {
    /// Wraps an arbitrary error as a failure, recovering a classified error
    /// if that is what it is.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from(anyhow::Error::new(err))
    }

    /// Converts a caught panic payload into a fault.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::Fault(anyhow::Error::new(HandlerPanic::from_payload(payload.as_ref())))
    }

    #[must_use]
    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Classified(_))
    }

    #[must_use]
    pub fn as_classified(&self) -> Option<&ClassifiedError> {
        match self {
            Self::Classified(err) => Some(err),
            Self::Fault(_) => None,
        }
    }

    #[must_use]
    pub fn as_fault(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Classified(_) => None,
            Self::Fault(err) => Some(err),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classified(err) => fmt::Display::fmt(err, f),
            Self::Fault(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl From<ClassifiedError> for Failure {
    fn from(err: ClassifiedError) -> Self {
        Self::Classified(err)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ClassifiedError>() {
            Ok(classified) => Self::Classified(classified),
            Err(fault) => Self::Fault(fault),
        }
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Self::Fault(err.into())
    }
}

/// A handler panicked, either while being invoked or while its future was polled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handler panicked: {message}")]
pub struct HandlerPanic {
    pub message: String,
}

impl HandlerPanic {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routekit_core::StatusCode;

    #[derive(Debug, thiserror::Error)]
    #[error("disk on fire: {0}")]
    struct DiskError(u32);

    #[test]
    fn classified_error_stays_classified() {
        let failure = Failure::from(ClassifiedError::bad_request("Name required"));
        assert!(failure.is_classified());
        assert_eq!(failure.to_string(), "Name required");
    }

    #[test]
    fn anyhow_wrapped_classified_error_is_recovered() {
        let err = anyhow::Error::new(ClassifiedError::not_found("no user"));
        let failure = Failure::from(err);
        assert_eq!(
            failure.as_classified().map(ClassifiedError::code),
            Some(StatusCode::NOT_FOUND)
        );
    }

    #[test]
    fn context_wrapped_classified_error_is_recovered() {
        let err = anyhow::Error::new(ClassifiedError::forbidden("nope")).context("loading user");
        let failure = Failure::from(err);
        assert_eq!(
            failure.as_classified().map(ClassifiedError::code),
            Some(StatusCode::FORBIDDEN)
        );
    }

    #[test]
    fn arbitrary_error_becomes_fault_unmodified() {
        let failure = Failure::from_error(DiskError(7));
        let fault = failure.as_fault().unwrap();
        assert_eq!(fault.downcast_ref::<DiskError>().map(|e| e.0), Some(7));
    }

    #[test]
    fn panic_payloads_become_faults() {
        let failure = Failure::from_panic(Box::new("boom"));
        let panic = failure.as_fault().unwrap().downcast_ref::<HandlerPanic>().unwrap();
        assert_eq!(panic.message, "boom");

        let failure = Failure::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(failure.to_string(), "handler panicked: owned boom");

        let failure = Failure::from_panic(Box::new(42_u8));
        assert_eq!(failure.to_string(), "handler panicked: non-string panic payload");
    }
}
