//! # routeforge
//!
//! A condition-based request router: routes are declared through nested
//! scopes, compiled into an ordered table of regular expressions, matched
//! against request descriptors, and turned back into URLs by name.
//!
//! ## Architecture
//!
//! - **[`router`]** - scope DSL, route compilation, matching and URL generation
//! - **[`query`]** - nested parameter maps to and from bracketed query strings
//! - **[`config`]** - YAML route files
//! - **[`hot_reload`]** - reinstall a route file when it changes
//! - **[`runtime_config`]** - environment configuration
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`cli`]** - the `routeforge` command
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host as Host framework
//!     participant Router as Router
//!     participant Table as Route table snapshot
//!     participant Route as Route
//!
//!     Host->>Router: match_request(&Request)
//!     Router->>Table: load()
//!     loop routes in declaration order
//!         Router->>Route: try_match(request)
//!         Route->>Route: test every condition regex
//!         Route->>Route: evaluate output params from captures
//!         Route->>Route: run deferred predicate (if any)
//!     end
//!     Router-->>Host: RouteMatch { index, params }
//! ```
//!
//! ## Example
//!
//! ```
//! use routeforge::router::{Conditions, Request, ResourceOptions, Router};
//!
//! let router = Router::new();
//! router.prepare(|r| {
//!     r.match_with("/login", Conditions::new().method("post"))
//!         .to(&[("controller", "sessions"), ("action", "create")])?;
//!     r.resources("posts", ResourceOptions::new())?;
//!     r.default_routes(&[])?;
//!     Ok(())
//! })?;
//!
//! let found = router.match_request(&Request::new("/posts/3").method("GET"));
//! assert_eq!(found.get("controller"), Some("posts"));
//! assert_eq!(found.get("action"), Some("show"));
//! assert_eq!(router.url("post", &[("id", 3)])?, "/posts/3");
//! # Ok::<(), routeforge::router::RouteError>(())
//! ```

pub mod cli;
pub mod config;
pub mod hot_reload;
pub mod logging;
pub mod query;
pub mod router;
pub mod runtime_config;

pub use config::RoutesFile;
pub use query::{parse_query, to_query_string, QueryError, QueryMap, ToParam, Value, MAX_NESTING};
pub use router::{Request, RouteError, RouteMatch, Router};
