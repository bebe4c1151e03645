//! # Router Module
//!
//! Declares routes through a nested scope DSL, compiles them into an ordered
//! routing table, matches request descriptors against it and rebuilds URLs
//! from named routes.
//!
//! ## Overview
//!
//! - **Declaration**: each `match_*` call opens a scope (a behavior) holding
//!   conditions on the path, method, protocol, host or any custom request
//!   field. `:name` placeholders in a condition become captures and, by
//!   default, output params of the same name.
//! - **Compilation**: `to` merges a scope with its ancestors (path fragments
//!   are concatenated, other conditions inherited or overridden) and freezes
//!   it into a [`Route`] with one regex per condition key.
//! - **Matching**: routes are tried in declaration order; the first one whose
//!   conditions all match wins and its output params are evaluated from the
//!   captures.
//! - **Generation**: named routes with a plain-text path are turned back into
//!   URLs, with unused params appended as a query string.
//!
//! ## Example
//!
//! ```
//! use routeforge::router::{Request, Router};
//!
//! let router = Router::new();
//! router.prepare(|r| {
//!     r.match_path("/items/:id").to(&[("controller", "items"), ("action", "show")])?
//!         .name("item")?;
//!     r.default_routes(&[])?;
//!     Ok(())
//! })?;
//!
//! let found = router.match_request(&Request::new("/items/42"));
//! assert_eq!(found.index, Some(0));
//! assert_eq!(found.get("id"), Some("42"));
//!
//! assert_eq!(router.url("item", &[("id", 42)])?, "/items/42");
//! # Ok::<(), routeforge::router::RouteError>(())
//! ```
//!
//! ## Concurrency
//!
//! Matching and generation read an immutable snapshot of the routing table;
//! `prepare` publishes a new snapshot with an atomic swap, so in-flight
//! matches never see a half-built table.

mod behavior;
mod builder;
mod condition;
mod core;
mod error;
mod generate;
mod params;
mod request;
mod route;
#[cfg(test)]
mod tests;

pub use builder::{ResourceOptions, RouteHandle, RouteSet, Scope};
pub use condition::{ConditionKey, Conditions, Pattern};
pub use core::{RouteMatch, Router, DEFAULT_SLOW_MATCH};
pub use error::RouteError;
pub use generate::ParamSource;
pub use params::{OutputExpr, OutputPart, MAX_INLINE_CONDITIONS};
pub use request::Request;
pub use route::{DeferredFn, Params, Route, Segment};
