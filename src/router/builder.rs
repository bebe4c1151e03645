//! Route declaration DSL.
//!
//! [`Router::prepare`](super::Router::prepare) hands the caller a root
//! [`Scope`]; scopes nest with `match_*` / `to_scope`, and `to` freezes a scope
//! into a registered [`Route`].
//!
//! ```
//! use routeforge::router::{Conditions, Router};
//!
//! let router = Router::new();
//! router.prepare(|r| {
//!     r.match_path("/contact").to(&[("controller", "info"), ("action", "contact")])?;
//!     r.match_path("/accounts").routes(|a| {
//!         a.match_path("/:id/:action").to(&[("controller", "accounts")])?;
//!         Ok(())
//!     })?;
//!     r.match_with("/movies/create", Conditions::new().method("post"))
//!         .to(&[("controller", "movies"), ("action", "create")])?;
//!     Ok(())
//! })?;
//! # Ok::<(), routeforge::router::RouteError>(())
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::behavior::{BehaviorId, BehaviorTree};
use super::condition::{Conditions, Pattern};
use super::error::RouteError;
use super::request::Request;
use super::route::{Params, Route};

/// Where a named route lives inside a [`RouteSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteSlot {
    /// Position among the registered routes of the set
    Registered(usize),
    /// Built only for URL generation, never matched
    Detached(usize),
}

/// Compilation context of one `prepare` call: the behavior arena and the
/// routes declared so far.
pub struct RouteSet {
    tree: BehaviorTree,
    defaults: Params,
    pub(crate) routes: Vec<Route>,
    pub(crate) detached: Vec<Route>,
    pub(crate) names: HashMap<String, RouteSlot>,
}

impl RouteSet {
    /// `defaults` become the root scope's params and the fallback values for
    /// capture-derived params that come out empty.
    pub(crate) fn new(defaults: &Params) -> Self {
        Self {
            tree: BehaviorTree::new(defaults),
            defaults: defaults.clone(),
            routes: Vec::new(),
            detached: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// The scope every declaration starts from.
    pub fn root(&mut self) -> Scope<'_> {
        let id = self.tree.root();
        Scope { set: self, id }
    }

    fn route_mut(&mut self, slot: RouteSlot) -> &mut Route {
        match slot {
            RouteSlot::Registered(i) => &mut self.routes[i],
            RouteSlot::Detached(i) => &mut self.detached[i],
        }
    }

    fn freeze(
        &mut self,
        id: BehaviorId,
        params: &Params,
        deferred: Option<super::route::DeferredFn>,
        register: bool,
    ) -> Result<RouteSlot, RouteError> {
        let route = Route::from_behavior(&self.tree, id, params, &self.defaults, deferred)?;
        if register {
            let index = self.routes.len();
            debug!(
                index,
                conditions = ?route.original_conditions,
                deferred = route.is_deferred(),
                "Route registered"
            );
            let mut route = route;
            route.index = index;
            self.routes.push(route);
            Ok(RouteSlot::Registered(index))
        } else {
            self.detached.push(route);
            Ok(RouteSlot::Detached(self.detached.len() - 1))
        }
    }
}

fn to_params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A position in the behavior tree plus the set being built.
pub struct Scope<'a> {
    set: &'a mut RouteSet,
    id: BehaviorId,
}

impl<'a> Scope<'a> {
    fn child(&mut self, conditions: &Conditions, params: Params) -> Scope<'_> {
        let id = self.set.tree.add(Some(self.id), conditions, params);
        Scope {
            set: &mut *self.set,
            id,
        }
    }

    /// Nested scope matching `path` (appended to this scope's path).
    pub fn match_path(&mut self, path: impl Into<Pattern>) -> Scope<'_> {
        self.child(&Conditions::new().path(path), Params::new())
    }

    /// Nested scope matching `path` plus further conditions.
    pub fn match_with(&mut self, path: impl Into<Pattern>, conditions: Conditions) -> Scope<'_> {
        self.child(&conditions.path(path), Params::new())
    }

    /// Nested scope with conditions only (host, protocol, custom fields...).
    pub fn match_conditions(&mut self, conditions: Conditions) -> Scope<'_> {
        self.child(&conditions, Params::new())
    }

    /// Nested scope that only contributes params to the routes declared in it.
    pub fn to_scope(&mut self, params: &[(&str, &str)]) -> Scope<'_> {
        self.child(&Conditions::new(), to_params(params))
    }

    /// Declare routes inside this scope; returns the scope so a catch-all
    /// route can follow the block.
    pub fn routes<F>(&mut self, declare: F) -> Result<&mut Self, RouteError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), RouteError>,
    {
        let mut nested = Scope {
            set: &mut *self.set,
            id: self.id,
        };
        declare(&mut nested)?;
        Ok(self)
    }

    /// Register a route for this scope with `params` merged over the
    /// inherited ones.
    pub fn to(&mut self, params: &[(&str, &str)]) -> Result<RouteHandle<'_>, RouteError> {
        let slot = self.set.freeze(self.id, &to_params(params), None, true)?;
        Ok(RouteHandle {
            set: &mut *self.set,
            slot,
        })
    }

    /// Build a route that is never matched and only serves URL generation.
    pub fn to_route(&mut self, params: &[(&str, &str)]) -> Result<RouteHandle<'_>, RouteError> {
        let slot = self.set.freeze(self.id, &to_params(params), None, false)?;
        Ok(RouteHandle {
            set: &mut *self.set,
            slot,
        })
    }

    /// Register a route whose final decision is made at match time by
    /// `predicate`, called with the request and the params compiled so far.
    pub fn defer_to<F>(
        &mut self,
        params: &[(&str, &str)],
        predicate: F,
    ) -> Result<RouteHandle<'_>, RouteError>
    where
        F: Fn(&Request, &Params) -> Option<Params> + Send + Sync + 'static,
    {
        let slot = self
            .set
            .freeze(self.id, &to_params(params), Some(Arc::new(predicate)), true)?;
        Ok(RouteHandle {
            set: &mut *self.set,
            slot,
        })
    }

    /// `/:controller(/:action(/:id))(.:format)`, anchored at both ends.
    pub fn default_routes(&mut self, params: &[(&str, &str)]) -> Result<RouteHandle<'_>, RouteError> {
        let id = self.set.tree.add(
            Some(self.id),
            &Conditions::new().path(Pattern::regex(
                r"^/:controller(/:action(/:id)?)?(\.:format)?$",
            )),
            Params::new(),
        );
        let slot = self.set.freeze(id, &to_params(params), None, true)?;
        Ok(RouteHandle {
            set: &mut *self.set,
            slot,
        })
    }

    /// The eight RESTful routes for a plural resource under `/name`, with
    /// named routes for generation.
    pub fn resources(&mut self, name: &str, options: ResourceOptions) -> Result<(), RouteError> {
        self.resources_with(name, options, |_| Ok(()))
    }

    /// Like [`resources`](Self::resources); `nested` declares routes under
    /// `/name/:<singular>_id`.
    pub fn resources_with<F>(
        &mut self,
        name: &str,
        options: ResourceOptions,
        nested: F,
    ) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), RouteError>,
    {
        let resource = ResolvedResource::new(self, name, &options)?;
        let singular = &resource.singular;
        let prefix = &resource.prefix;
        let next = self.set.tree.add(
            Some(self.id),
            &Conditions::new().path(format!("/{name}")),
            Params::new(),
        );

        let mut behaviors = Vec::new();
        for (action, methods) in &options.member {
            let conditions = Conditions::new()
                .path(Pattern::regex(format!("^/:id[/;]{action}$")))
                .method(methods_pattern(methods));
            behaviors.push(self.set.tree.add(
                Some(next),
                &conditions,
                to_params(&[("action", action.as_str())]),
            ));
            self.name_detached(next, &format!("/:id/{action}"), &format!("{action}_{prefix}{singular}"))?;
        }
        for (action, methods) in &options.collection {
            let conditions = Conditions::new()
                .path(Pattern::regex(format!("^[/;]{action}$")))
                .method(methods_pattern(methods));
            behaviors.push(self.set.tree.add(
                Some(next),
                &conditions,
                to_params(&[("action", action.as_str())]),
            ));
            self.name_detached(next, &format!("/{action}"), &format!("{action}_{prefix}{name}"))?;
        }
        for &(path, method, action) in &RESOURCES_ROUTES {
            let conditions = Conditions::new()
                .path(Pattern::regex(path))
                .method(Pattern::symbol(method));
            behaviors.push(self.set.tree.add(
                Some(next),
                &conditions,
                to_params(&[("action", action)]),
            ));
        }
        for behavior in behaviors {
            self.set.freeze(behavior, &resource.params, None, true)?;
        }

        self.name_detached(next, "", &format!("{prefix}{name}"))?;
        self.name_detached(next, "/:id", &format!("{prefix}{singular}"))?;
        self.name_detached(next, "/new", &format!("new_{prefix}{singular}"))?;
        self.name_detached(next, "/:id/edit", &format!("edit_{prefix}{singular}"))?;
        self.name_detached(next, "/:action/:id", &format!("custom_{prefix}{singular}"))?;

        let member_scope = self.set.tree.add(
            Some(next),
            &Conditions::new().path(format!("/:{singular}_id")),
            Params::new(),
        );
        let mut scope = Scope {
            set: &mut *self.set,
            id: member_scope,
        };
        nested(&mut scope)
    }

    /// The six routes for a singular resource under `/name`.
    pub fn resource(&mut self, name: &str, options: ResourceOptions) -> Result<(), RouteError> {
        self.resource_with(name, options, |_| Ok(()))
    }

    /// Like [`resource`](Self::resource); `nested` declares routes under `/name`.
    pub fn resource_with<F>(
        &mut self,
        name: &str,
        options: ResourceOptions,
        nested: F,
    ) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Scope<'_>) -> Result<(), RouteError>,
    {
        if !options.member.is_empty() || !options.collection.is_empty() {
            return Err(RouteError::InvalidOptions(format!(
                "singular resource '{name}' does not take member or collection actions"
            )));
        }
        let resource = ResolvedResource::new(self, name, &options)?;
        let prefix = &resource.prefix;
        let next = self.set.tree.add(
            Some(self.id),
            &Conditions::new().path(format!("/{name}")),
            Params::new(),
        );
        for &(path, method, action) in &RESOURCE_ROUTES {
            let conditions = Conditions::new()
                .path(Pattern::regex(path))
                .method(Pattern::symbol(method));
            let behavior =
                self.set
                    .tree
                    .add(Some(next), &conditions, to_params(&[("action", action)]));
            self.set.freeze(behavior, &resource.params, None, true)?;
        }

        self.name_detached(next, "", &format!("{prefix}{name}"))?;
        self.name_detached(next, "/new", &format!("new_{prefix}{name}"))?;
        self.name_detached(next, "/edit", &format!("edit_{prefix}{name}"))?;

        let mut scope = Scope {
            set: &mut *self.set,
            id: next,
        };
        nested(&mut scope)
    }

    fn name_detached(&mut self, parent: BehaviorId, path: &str, name: &str) -> Result<(), RouteError> {
        let id = self
            .set
            .tree
            .add(Some(parent), &Conditions::new().path(path), Params::new());
        let slot = self.set.freeze(id, &Params::new(), None, false)?;
        RouteHandle {
            set: &mut *self.set,
            slot,
        }
        .name(name)
    }
}

/// The route just declared; lets a name be attached once.
pub struct RouteHandle<'a> {
    set: &'a mut RouteSet,
    slot: RouteSlot,
}

impl RouteHandle<'_> {
    /// Attach `name` for URL generation.
    ///
    /// Fails when the route already has a name or its path cannot be rebuilt
    /// from plain text. A name already used by another route is silently
    /// taken over.
    pub fn name(self, name: &str) -> Result<(), RouteError> {
        let slot = self.slot;
        let route = self.set.route_mut(slot);
        if let Some(existing) = &route.name {
            return Err(RouteError::AlreadyNamed {
                existing: existing.clone(),
                requested: name.to_string(),
            });
        }
        route
            .reversibility()
            .map_err(|reason| RouteError::NotReversible {
                name: name.to_string(),
                reason,
            })?;
        route.name = Some(name.to_string());
        self.set.names.insert(name.to_string(), slot);
        Ok(())
    }

    /// Position among the routes registered by this `prepare` call, `None`
    /// for detached routes.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        match self.slot {
            RouteSlot::Registered(i) => Some(i),
            RouteSlot::Detached(_) => None,
        }
    }
}

/// Options for [`Scope::resources`] and [`Scope::resource`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Prefix for generated route names; defaults to `<namespace>_`
    pub name_prefix: Option<String>,
    /// Controller param; defaults to the enclosing scope's, else the name
    pub controller: Option<String>,
    /// Singular form used in names and the nested `:<singular>_id`
    pub singular: Option<String>,
    /// Extra per-member actions and the methods they accept
    pub member: Vec<(String, Vec<String>)>,
    /// Extra collection actions and the methods they accept
    pub collection: Vec<(String, Vec<String>)>,
    /// Further params for every generated route
    pub params: Vec<(String, String)>,
}

impl ResourceOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name_prefix(mut self, prefix: &str) -> Self {
        self.name_prefix = Some(prefix.to_string());
        self
    }

    #[must_use]
    pub fn controller(mut self, controller: &str) -> Self {
        self.controller = Some(controller.to_string());
        self
    }

    #[must_use]
    pub fn singular(mut self, singular: &str) -> Self {
        self.singular = Some(singular.to_string());
        self
    }

    #[must_use]
    pub fn member(mut self, action: &str, methods: &[&str]) -> Self {
        self.member.push((
            action.to_string(),
            methods.iter().map(|m| m.to_string()).collect(),
        ));
        self
    }

    #[must_use]
    pub fn collection(mut self, action: &str, methods: &[&str]) -> Self {
        self.collection.push((
            action.to_string(),
            methods.iter().map(|m| m.to_string()).collect(),
        ));
        self
    }

    #[must_use]
    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }
}

/// `(path regex, method, action)` for plural resources, in priority order.
const RESOURCES_ROUTES: [(&str, &str, &str); 8] = [
    (r"^/?(\.:format)?$", "get", "index"),
    (r"^/index(\.:format)?$", "get", "index"),
    (r"^/new$", "get", "new"),
    (r"^/?(\.:format)?$", "post", "create"),
    (r"^/:id(\.:format)?$", "get", "show"),
    (r"^/:id[;/]edit$", "get", "edit"),
    (r"^/:id(\.:format)?$", "put", "update"),
    (r"^/:id(\.:format)?$", "delete", "destroy"),
];

/// `(path regex, method, action)` for singular resources.
const RESOURCE_ROUTES: [(&str, &str, &str); 6] = [
    (r"^[;/]new$", "get", "new"),
    (r"^/?(\.:format)?$", "post", "create"),
    (r"^/?(\.:format)?$", "get", "show"),
    (r"^[;/]edit$", "get", "edit"),
    (r"^/?(\.:format)?$", "put", "update"),
    (r"^/?(\.:format)?$", "delete", "destroy"),
];

fn methods_pattern(methods: &[String]) -> Pattern {
    let alternatives: Vec<String> = methods.iter().map(|m| regex::escape(&m.to_lowercase())).collect();
    Pattern::regex(format!("^({})$", alternatives.join("|")))
}

/// Names and params shared by every route of one resource declaration.
struct ResolvedResource {
    singular: String,
    prefix: String,
    params: Params,
}

impl ResolvedResource {
    fn new(scope: &Scope<'_>, name: &str, options: &ResourceOptions) -> Result<Self, RouteError> {
        if name.is_empty() || name.contains('/') {
            return Err(RouteError::InvalidOptions(format!(
                "resource name '{name}' must be a single non-empty path segment"
            )));
        }
        let inherited = scope.set.tree.merged_params(scope.id);
        let mut params: Params = options.params.iter().cloned().collect();

        let namespace = params
            .get("namespace")
            .or_else(|| inherited.get("namespace"))
            .cloned();
        let prefix = options
            .name_prefix
            .clone()
            .or_else(|| namespace.map(|ns| format!("{ns}_")))
            .unwrap_or_default();
        let controller = options
            .controller
            .clone()
            .or_else(|| inherited.get("controller").cloned())
            .unwrap_or_else(|| name.to_string());
        params.insert("controller".to_string(), controller);

        Ok(Self {
            singular: options
                .singular
                .clone()
                .unwrap_or_else(|| singularize(name)),
            prefix,
            params,
        })
    }
}

/// English singular for the common plural endings.
pub(crate) fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{stem}y")
    } else if word.ends_with("sses") || word.ends_with("xes") || word.ends_with("ches") {
        word[..word.len() - 2].to_string()
    } else if word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}
