//! Router core: the routing table snapshot, matching and URL generation.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::builder::{RouteSet, RouteSlot, Scope};
use super::error::RouteError;
use super::generate::{self, ParamSource};
use super::request::Request;
use super::route::{Params, Route};
use crate::query::QueryMap;

/// Matches slower than this are logged at `warn`.
pub const DEFAULT_SLOW_MATCH: Duration = Duration::from_micros(1000);

/// Result of matching one request.
///
/// A request that matches no route is not an error: `index` is `None` and
/// `params` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    /// Index of the winning route in the routing table
    pub index: Option<usize>,
    /// Output params of the winning route
    pub params: Params,
}

impl RouteMatch {
    #[inline]
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.index.is_some()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
enum NamedRoute {
    /// Position in the route list
    Listed(usize),
    /// Generation-only route outside the list
    Detached(Arc<Route>),
}

/// One compiled snapshot: the ordered routes and the name index.
#[derive(Debug, Default)]
struct RouteTable {
    routes: Vec<Arc<Route>>,
    named: HashMap<String, NamedRoute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Splice {
    Replace,
    Prepend,
    Append,
}

impl RouteTable {
    fn from_set(set: RouteSet) -> Self {
        let detached: Vec<Arc<Route>> = set.detached.into_iter().map(Arc::new).collect();
        let named = set
            .names
            .into_iter()
            .filter_map(|(name, slot)| match slot {
                RouteSlot::Registered(i) => Some((name, NamedRoute::Listed(i))),
                RouteSlot::Detached(i) => detached
                    .get(i)
                    .map(|route| (name, NamedRoute::Detached(Arc::clone(route)))),
            })
            .collect();
        Self {
            routes: set.routes.into_iter().map(Arc::new).collect(),
            named,
        }
    }

    /// Combine `fresh` with the current table. Positions are reassigned so
    /// that indices always follow list order; names declared by `fresh` take
    /// over existing ones.
    fn splice(&self, fresh: RouteTable, how: Splice) -> RouteTable {
        let (first, second, fresh_first) = match how {
            Splice::Replace => return fresh,
            Splice::Prepend => (&fresh, self, true),
            Splice::Append => (self, &fresh, false),
        };
        let offset = first.routes.len();

        let routes = first
            .routes
            .iter()
            .cloned()
            .chain(
                second
                    .routes
                    .iter()
                    .enumerate()
                    .map(|(i, route)| Arc::new(route.with_index(offset + i))),
            )
            .collect();

        let shift = |named: &HashMap<String, NamedRoute>, by: usize| {
            named
                .iter()
                .map(|(name, entry)| {
                    let entry = match entry {
                        NamedRoute::Listed(i) => NamedRoute::Listed(i + by),
                        NamedRoute::Detached(route) => NamedRoute::Detached(Arc::clone(route)),
                    };
                    (name.clone(), entry)
                })
                .collect::<Vec<_>>()
        };
        let (old_names, fresh_names) = if fresh_first {
            (shift(&self.named, offset), shift(&fresh.named, 0))
        } else {
            (shift(&self.named, 0), shift(&fresh.named, offset))
        };
        let mut named = HashMap::with_capacity(old_names.len() + fresh_names.len());
        named.extend(old_names);
        named.extend(fresh_names);

        RouteTable { routes, named }
    }

    fn named(&self, name: &str) -> Option<Arc<Route>> {
        match self.named.get(name)? {
            NamedRoute::Listed(i) => self.routes.get(*i).cloned(),
            NamedRoute::Detached(route) => Some(Arc::clone(route)),
        }
    }
}

/// The routing table of a process.
///
/// Matching reads an immutable snapshot, so any number of threads can call
/// [`match_request`](Self::match_request) and [`generate`](Self::generate)
/// while a new table is being prepared; the new one is published with a
/// single atomic swap. `prepare`, `prepend` and `append` themselves are not
/// synchronized with each other: run them from one thread at a time.
pub struct Router {
    table: ArcSwap<RouteTable>,
    defaults: ArcSwap<Params>,
    slow_match: Duration,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.load();
        f.debug_struct("Router")
            .field("routes", &table.routes.len())
            .field("named", &table.named.len())
            .field("defaults", &**self.defaults.load())
            .finish()
    }
}

impl Router {
    /// An empty router. The root scope carries `action: "index"`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
            defaults: ArcSwap::from_pointee(Self::initial_defaults()),
            slow_match: DEFAULT_SLOW_MATCH,
        }
    }

    /// Threshold above which a match is reported as slow.
    #[must_use]
    pub fn with_slow_match_threshold(mut self, threshold: Duration) -> Self {
        self.slow_match = threshold;
        self
    }

    /// The defaults of a fresh router: `{action: "index"}`.
    #[must_use]
    pub fn initial_defaults() -> Params {
        let mut defaults = Params::new();
        defaults.insert("action".to_string(), "index".to_string());
        defaults
    }

    /// Params of the root scope, also used when a capture-derived param comes
    /// out empty. Takes effect on the next `prepare`.
    pub fn set_defaults(&self, defaults: Params) {
        self.defaults.store(Arc::new(defaults));
    }

    #[must_use]
    pub fn defaults(&self) -> Params {
        (**self.defaults.load()).clone()
    }

    /// Replace the routing table with the routes declared by `declare`.
    ///
    /// Nothing is published when `declare` fails; the previous table stays
    /// in effect.
    pub fn prepare<F>(&self, declare: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), RouteError>,
    {
        self.compile(declare, Splice::Replace, None)
    }

    /// [`prepare`](Self::prepare) with `defaults` as the root params.
    ///
    /// `defaults` replace the router's defaults only once the new table is
    /// published; a failed declaration leaves both untouched.
    pub fn prepare_with_defaults<F>(&self, defaults: Params, declare: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), RouteError>,
    {
        self.compile(declare, Splice::Replace, Some(defaults))
    }

    /// Declare routes ahead of the existing ones.
    pub fn prepend<F>(&self, declare: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), RouteError>,
    {
        self.compile(declare, Splice::Prepend, None)
    }

    /// Declare routes after the existing ones.
    pub fn append<F>(&self, declare: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), RouteError>,
    {
        self.compile(declare, Splice::Append, None)
    }

    fn compile<F>(&self, declare: F, how: Splice, defaults: Option<Params>) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), RouteError>,
    {
        let mut set = match &defaults {
            Some(defaults) => RouteSet::new(defaults),
            None => RouteSet::new(&self.defaults.load()),
        };
        declare(&mut set.root())?;

        let fresh = RouteTable::from_set(set);
        let declared = fresh.routes.len();
        let table = self.table.load().splice(fresh, how);

        let routes_summary: Vec<String> = table
            .routes
            .iter()
            .take(10)
            .map(|route| route.to_string())
            .collect();
        info!(
            routes_count = table.routes.len(),
            declared,
            named_count = table.named.len(),
            splice = ?how,
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );

        self.table.store(Arc::new(table));
        if let Some(defaults) = defaults {
            self.defaults.store(Arc::new(defaults));
        }
        Ok(())
    }

    /// Match a request against the routes in order; the first route whose
    /// conditions all match (and whose deferred predicate, if any, accepts)
    /// wins.
    #[must_use]
    pub fn match_request(&self, request: &Request) -> RouteMatch {
        debug!(
            method = %request.method_str(),
            path = %request.path(),
            host = %request.host_str(),
            "Route match attempt"
        );

        let match_start = Instant::now();
        let table = self.table.load();
        let found = table
            .routes
            .iter()
            .find_map(|route| route.try_match(request).map(|params| (route, params)));
        let match_duration = match_start.elapsed();

        let Some((route, params)) = found else {
            warn!(
                method = %request.method_str(),
                path = %request.path(),
                routes_scanned = table.routes.len(),
                duration_us = match_duration.as_micros(),
                "No route matched"
            );
            return RouteMatch::default();
        };

        if match_duration > self.slow_match {
            warn!(
                method = %request.method_str(),
                path = %request.path(),
                route_index = route.index(),
                route_name = route.name().unwrap_or_default(),
                params = ?params,
                duration_us = match_duration.as_micros(),
                "Slow route matching detected"
            );
        } else {
            info!(
                method = %request.method_str(),
                path = %request.path(),
                route_index = route.index(),
                route_name = route.name().unwrap_or_default(),
                params = ?params,
                duration_us = match_duration.as_micros(),
                "Route matched"
            );
        }

        RouteMatch {
            index: Some(route.index()),
            params,
        }
    }

    /// Build the URL of the route called `name`.
    ///
    /// Placeholders read `params` first, then `fallback`. Params the path does
    /// not use are appended as a query string.
    pub fn generate<P: ParamSource + ?Sized>(
        &self,
        name: &str,
        params: &P,
        fallback: &QueryMap,
    ) -> Result<String, RouteError> {
        let route = self
            .named_route(name)
            .ok_or_else(|| RouteError::NamedRouteNotFound(name.to_string()))?;
        let url = generate::generate(&route, params, fallback)?;
        debug!(route_name = %name, url = %url, "URL generated");
        Ok(url)
    }

    /// [`generate`](Self::generate) without fallback values.
    pub fn url<P: ParamSource + ?Sized>(&self, name: &str, params: &P) -> Result<String, RouteError> {
        self.generate(name, params, &QueryMap::new())
    }

    #[must_use]
    pub fn named_route(&self, name: &str) -> Option<Arc<Route>> {
        self.table.load().named(name)
    }

    /// Names usable with [`generate`](Self::generate), sorted.
    #[must_use]
    pub fn route_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.load().named.keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn route_at(&self, index: usize) -> Option<Arc<Route>> {
        self.table.load().routes.get(index).cloned()
    }

    /// The routes of the current snapshot, in priority order.
    #[must_use]
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.table.load().routes.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.load().routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One line per route: index, name, conditions and output params.
    #[must_use]
    pub fn route_summaries(&self) -> Vec<String> {
        self.table
            .load()
            .routes
            .iter()
            .map(|route| route.to_string())
            .collect()
    }

    /// Print all routes to stdout.
    pub fn dump_routes(&self) {
        let table = self.table.load();
        println!(
            "[routes] count={} named={}",
            table.routes.len(),
            table.named.len()
        );
        for route in &table.routes {
            println!("[route] {route}");
        }
    }
}
