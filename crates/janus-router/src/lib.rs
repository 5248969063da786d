//! Radix tree route table for Janus.
//!
//! The router is generic over the endpoint it stores, so the same table can
//! hold boxed request handlers in the server and plain strings in tests. A
//! lookup yields the endpoint, the captured path parameters and the
//! normalized route template that matched. The template is what metrics and
//! logs use as the low-cardinality route label.
//!
//! ```rust
//! use janus_router::{MethodRouter, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert("/users", MethodRouter::new().get("list").post("create")).unwrap();
//! router.insert("/users/{id}", MethodRouter::new().get("show")).unwrap();
//! router.insert("/files/*path", MethodRouter::new().get("file")).unwrap();
//!
//! let found = router.lookup(&Method::GET, "/users/123").unwrap();
//! assert_eq!(found.template, "/users/{id}");
//! assert_eq!(found.params.get("id"), Some("123"));
//! ```
//!
//! # Tree shape
//!
//! ```text
//!              (root)
//!                │
//!        ┌───────┴───────┐
//!     "users"         "files"
//!        │               │
//!   [GET,POST]        "*path"
//!        │
//!      "{id}"
//!      [GET]
//! ```

mod method_router;
mod node;
mod params;
mod router;

pub use method_router::MethodRouter;
pub use params::Params;
pub use router::{Miss, RouteMatch, Router};

/// Errors raised while registering a route template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// A `*wildcard` segment appeared before the end of the template.
    #[error("wildcard must be the last segment in `{0}`")]
    WildcardNotLast(String),

    /// A `{}` segment has no name.
    #[error("empty parameter name in `{0}`")]
    EmptyParamName(String),

    /// Two templates capture the same position under different names.
    #[error("`{template}` captures `{new}` where `{existing}` is already registered")]
    ConflictingParam {
        /// Template being registered.
        template: String,
        /// Segment already in the tree.
        existing: String,
        /// Capture name in the new template.
        new: String,
    },
}
