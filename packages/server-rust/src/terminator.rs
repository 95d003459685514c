//! Error terminator: the single place where failures become wire responses.
//!
//! Classified errors are written as they are. Every other fault is reported
//! once through the configured hook and replaced by a generic 500 whose
//! message and detail only reveal the fault in development mode.
//!
//! One terminator is installed per process with [`install`]; its
//! configuration cannot change afterwards.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use routekit_core::{ClassifiedError, RequestContext};
use tracing::{debug, error, warn};

use crate::pipeline::{Failure, ResponseSink};

/// Message sent for unclassified faults outside development mode.
pub const GENERIC_FAULT_MESSAGE: &str = "Internal server error";

/// Callback invoked with every unclassified fault before it is masked.
pub type UnhandledErrorHook = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

// ---------------------------------------------------------------------------
// TerminatorConfig
// ---------------------------------------------------------------------------

/// Terminator configuration, fixed at installation.
#[derive(Clone)]
pub struct TerminatorConfig {
    /// Expose fault messages and debug output to clients.
    pub dev_mode: bool,
    /// Side effect for unclassified faults. Panics inside it are swallowed.
    pub on_unhandled_error: UnhandledErrorHook,
}

impl TerminatorConfig {
    #[must_use]
    pub fn new(dev_mode: bool) -> Self {
        Self {
            dev_mode,
            on_unhandled_error: Arc::new(log_unhandled_error),
        }
    }

    /// Replaces the unhandled-error hook.
    #[must_use]
    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&anyhow::Error) + Send + Sync + 'static,
    {
        self.on_unhandled_error = Arc::new(hook);
        self
    }
}

impl Default for TerminatorConfig {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for TerminatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminatorConfig")
            .field("dev_mode", &self.dev_mode)
            .finish_non_exhaustive()
    }
}

/// Default hook: logs the fault and its cause chain at error level.
pub fn log_unhandled_error(err: &anyhow::Error) {
    error!(error = ?err, "unhandled error");
}

// ---------------------------------------------------------------------------
// ErrorTerminator
// ---------------------------------------------------------------------------

/// Converts failures into exactly one response.
#[derive(Debug, Clone, Default)]
pub struct ErrorTerminator {
    config: TerminatorConfig,
}

impl ErrorTerminator {
    #[must_use]
    pub fn new(config: TerminatorConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    /// Maps a failure to the classified error that will be sent.
    ///
    /// Unclassified faults are reported through the hook here, exactly once
    /// per call.
    #[must_use]
    pub fn classify(&self, failure: Failure) -> ClassifiedError {
        match failure {
            Failure::Classified(err) => err,
            Failure::Fault(fault) => {
                self.report(&fault);
                self.mask(&fault)
            }
        }
    }

    /// Writes the response for `failure` to `sink`.
    ///
    /// If the sink is already committed, the handler got its response out
    /// before failing; the error is logged and no second write happens.
    pub fn terminate<S>(&self, failure: Failure, ctx: &RequestContext, sink: &S)
    where
        S: ResponseSink + ?Sized,
    {
        let err = self.classify(failure);

        if sink.is_committed() {
            warn!(
                request_id = ctx.request_id(),
                code = err.code().as_u16(),
                error = %err,
                "response already committed; dropping error response"
            );
            return;
        }

        debug!(
            request_id = ctx.request_id(),
            method = %ctx.method(),
            path = ctx.path(),
            code = err.code().as_u16(),
            "writing error response"
        );
        sink.write_status(err.code());
        sink.write_json(err.to_body());
    }

    fn report(&self, fault: &anyhow::Error) {
        let hook = &self.config.on_unhandled_error;
        if panic::catch_unwind(AssertUnwindSafe(|| hook(fault))).is_err() {
            warn!("unhandled-error hook panicked; continuing");
        }
    }

    fn mask(&self, fault: &anyhow::Error) -> ClassifiedError {
        if self.config.dev_mode {
            ClassifiedError::internal(fault.to_string())
                .with_detail_entry("stack", format!("{fault:?}"))
        } else {
            ClassifiedError::internal(GENERIC_FAULT_MESSAGE)
        }
    }
}

// ---------------------------------------------------------------------------
// Process-wide installation
// ---------------------------------------------------------------------------

static INSTALLED: OnceLock<ErrorTerminator> = OnceLock::new();

/// Errors from [`install`].
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("an error terminator is already installed for this process")]
    AlreadyInstalled,
}

/// Installs the process-wide terminator.
///
/// # Errors
///
/// Returns [`InstallError::AlreadyInstalled`] if a terminator was installed
/// before, or one was created implicitly by [`installed`].
pub fn install(config: TerminatorConfig) -> Result<&'static ErrorTerminator, InstallError> {
    let mut fresh = false;
    let terminator = INSTALLED.get_or_init(|| {
        fresh = true;
        ErrorTerminator::new(config)
    });
    if fresh {
        Ok(terminator)
    } else {
        Err(InstallError::AlreadyInstalled)
    }
}

/// The installed terminator, or a default one installed on first use.
pub fn installed() -> &'static ErrorTerminator {
    INSTALLED.get_or_init(ErrorTerminator::default)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
