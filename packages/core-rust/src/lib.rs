//! `routekit` Core: classified errors, response envelopes, and the request context.

pub mod context;
pub mod envelope;
pub mod error;
pub mod status;

pub use context::{RequestContext, REQUEST_ID_HEADER};
pub use envelope::{Envelope, PageMeta};
pub use error::{ClassifiedError, ErrorMessage};
pub use status::{canonical_message, classify, InvalidStatus};

// Re-exported so downstream crates name the same `StatusCode` type.
pub use http::StatusCode;

#[cfg(test)]
mod tests {
    #[test]
    fn crate_loads() {
        // Empty body: if this test runs, the crate compiles and loads.
    }
}
