//! Host pipeline collaborator types.
//!
//! Every handler receives the same triple: a [`RequestContext`], a response
//! sink ([`ResponseWriter`]) and a continuation ([`Next`]). Failures travel
//! through the continuation as [`Failure`] values.
//!
//! [`RequestContext`]: routekit_core::RequestContext

pub mod failure;
pub mod next;
pub mod sink;

pub use failure::{Failure, HandlerPanic};
pub use next::Next;
pub use sink::{CookieOptions, ResponseSink, ResponseWriter, SameSite};
