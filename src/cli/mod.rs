//! # CLI Module
//!
//! The `routeforge` binary: inspect a route file, match requests against it
//! and generate URLs from its named routes.
//!
//! ```bash
//! # Print the compiled routing table
//! routeforge --file config/routes.yaml routes
//!
//! # Match one request; prints {"index": .., "name": .., "params": {..}}
//! routeforge --file config/routes.yaml match --path /items/42 --method get
//!
//! # Match `METHOD PATH` lines from stdin, reloading the file on change
//! routeforge --file config/routes.yaml watch
//!
//! # Build a URL from a named route
//! routeforge --file config/routes.yaml generate --name item --param id=42 --param sort=asc
//! ```
//!
//! `--file` defaults to `ROUTEFORGE_ROUTES`. Logging is configured through the
//! `ROUTEFORGE_LOG_*` variables and written to stderr.

mod commands;


pub use commands::{execute, run_cli, Cli, Commands, RequestArgs};
