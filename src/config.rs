//! # Route Files
//!
//! Routes can be declared in YAML instead of code. A file holds optional
//! root `defaults` and a list of entries, each either a match entry, a
//! resource declaration or the default catch-all routes:
//!
//! ```yaml
//! defaults:
//!   action: index
//! routes:
//!   - path: /contact
//!     params: { controller: info, action: contact }
//!     name: contact
//!   - path: /admin
//!     params: { namespace: admin }
//!     scope:
//!       - resources: users
//!         member: { suspend: [post, put] }
//!   - path: { regex: '^/movies/(\d+)-(\d+)$' }
//!     conditions: { method: get, user_agent: { regex: 'Gecko' } }
//!     params: { controller: movies, movie_id: '[1][2]' }
//!   - default_routes: true
//! ```
//!
//! Entries with a `scope` open a nested scope: their `params` apply to every
//! route inside it, and an optional `catch_all` declares one more route on
//! the scope itself after the nested ones.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::router::{
    ConditionKey, Conditions, Params, Pattern, ResourceOptions, RouteError, Router, Scope,
};

/// A parsed route file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutesFile {
    /// Root params; replace the router defaults when present
    #[serde(default)]
    pub defaults: Option<BTreeMap<String, ParamValue>>,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

/// One entry of a route file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RouteEntry {
    Resources(ResourcesEntry),
    Resource(ResourceEntry),
    DefaultRoutes(DefaultRoutesEntry),
    Match(MatchEntry),
}

/// A condition value: plain text is matched literally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
    Text(String),
    Regex { regex: String },
    Symbol { symbol: String },
}

impl From<&PatternSpec> for Pattern {
    fn from(spec: &PatternSpec) -> Self {
        match spec {
            PatternSpec::Text(text) => Pattern::literal(text.as_str()),
            PatternSpec::Regex { regex } => Pattern::regex(regex.as_str()),
            PatternSpec::Symbol { symbol } => Pattern::symbol(symbol.as_str()),
        }
    }
}

/// A scalar param value; numbers and booleans are kept in their text form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Number(serde_yaml::Number),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(text) => f.write_str(text),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// One method or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Methods {
    One(String),
    Many(Vec<String>),
}

impl Methods {
    fn as_vec(&self) -> Vec<&str> {
        match self {
            Methods::One(method) => vec![method.as_str()],
            Methods::Many(methods) => methods.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchEntry {
    #[serde(default)]
    pub path: Option<PatternSpec>,
    /// Further conditions by request field (`method`, `host`, `user_agent`...)
    #[serde(default)]
    pub conditions: BTreeMap<String, PatternSpec>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    pub name: Option<String>,
    #[serde(default)]
    pub scope: Vec<RouteEntry>,
    /// Params of a route declared on the scope after the nested entries
    pub catch_all: Option<BTreeMap<String, ParamValue>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourcesEntry {
    pub resources: String,
    pub name_prefix: Option<String>,
    pub controller: Option<String>,
    pub singular: Option<String>,
    #[serde(default)]
    pub member: BTreeMap<String, Methods>,
    #[serde(default)]
    pub collection: BTreeMap<String, Methods>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    /// Routes nested under `/<name>/:<singular>_id`
    #[serde(default)]
    pub scope: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceEntry {
    pub resource: String,
    pub name_prefix: Option<String>,
    pub controller: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    /// Routes nested under `/<name>`
    #[serde(default)]
    pub scope: Vec<RouteEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultRoutesEntry {
    pub default_routes: bool,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

fn to_pairs(params: &BTreeMap<String, ParamValue>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect()
}

fn as_refs(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
    pairs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

fn apply_entries(entries: &[RouteEntry], scope: &mut Scope<'_>) -> Result<(), RouteError> {
    entries.iter().try_for_each(|entry| entry.apply(scope))
}

impl RouteEntry {
    /// Declare this entry's routes in `scope`.
    pub fn apply(&self, scope: &mut Scope<'_>) -> Result<(), RouteError> {
        match self {
            RouteEntry::Match(entry) => entry.apply(scope),
            RouteEntry::Resources(entry) => {
                let mut options = ResourceOptions {
                    name_prefix: entry.name_prefix.clone(),
                    controller: entry.controller.clone(),
                    singular: entry.singular.clone(),
                    params: to_pairs(&entry.params),
                    ..ResourceOptions::default()
                };
                for (action, methods) in &entry.member {
                    options = options.member(action, &methods.as_vec());
                }
                for (action, methods) in &entry.collection {
                    options = options.collection(action, &methods.as_vec());
                }
                scope.resources_with(&entry.resources, options, |nested| {
                    apply_entries(&entry.scope, nested)
                })
            }
            RouteEntry::Resource(entry) => {
                let options = ResourceOptions {
                    name_prefix: entry.name_prefix.clone(),
                    controller: entry.controller.clone(),
                    params: to_pairs(&entry.params),
                    ..ResourceOptions::default()
                };
                scope.resource_with(&entry.resource, options, |nested| {
                    apply_entries(&entry.scope, nested)
                })
            }
            RouteEntry::DefaultRoutes(entry) => {
                if entry.default_routes {
                    let params = to_pairs(&entry.params);
                    scope.default_routes(&as_refs(&params))?;
                }
                Ok(())
            }
        }
    }
}

impl MatchEntry {
    fn conditions(&self) -> Conditions {
        let mut conditions = Conditions::new();
        for (field, spec) in &self.conditions {
            conditions = conditions.with(ConditionKey::parse(field), spec);
        }
        if let Some(path) = &self.path {
            conditions = conditions.path(path);
        }
        conditions
    }

    fn apply(&self, scope: &mut Scope<'_>) -> Result<(), RouteError> {
        let params = to_pairs(&self.params);
        let mut child = scope.match_conditions(self.conditions());

        if self.scope.is_empty() && self.catch_all.is_none() {
            let route = child.to(&as_refs(&params))?;
            return match &self.name {
                Some(name) => route.name(name),
                None => Ok(()),
            };
        }

        let mut nested = child.to_scope(&as_refs(&params));
        nested.routes(|inner| apply_entries(&self.scope, inner))?;
        if let Some(catch_all) = &self.catch_all {
            let catch_all = to_pairs(catch_all);
            let route = nested.to(&as_refs(&catch_all))?;
            if let Some(name) = &self.name {
                route.name(name)?;
            }
        } else if let Some(name) = &self.name {
            return Err(RouteError::InvalidOptions(format!(
                "name '{name}' on a scope entry needs a catch_all route to attach to"
            )));
        }
        Ok(())
    }
}

impl RoutesFile {
    /// Parse a route file from YAML text.
    ///
    /// Blank text is rejected: an editor truncating the file mid-save must
    /// not reload as an empty table.
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            bail!("route file is empty");
        }
        serde_yaml::from_str(text).context("Failed to parse route file")
    }

    /// Read and parse a route file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read route file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid route file {}", path.display()))
    }

    /// Declare every entry in `scope`.
    pub fn apply(&self, scope: &mut Scope<'_>) -> Result<(), RouteError> {
        apply_entries(&self.routes, scope)
    }

    /// Root params declared by the file, if any.
    #[must_use]
    pub fn defaults(&self) -> Option<Params> {
        self.defaults.as_ref().map(|defaults| {
            defaults
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect()
        })
    }

    /// Replace the routing table of `router` with this file's routes.
    ///
    /// The router's defaults become the file's `defaults`, or those of a fresh
    /// router when the file has none. Nothing changes if a route is invalid.
    pub fn install(&self, router: &Router) -> Result<(), RouteError> {
        let defaults = self.defaults().unwrap_or_else(Router::initial_defaults);
        router.prepare_with_defaults(defaults, |root| self.apply(root))
    }
}

impl Router {
    /// Replace the routing table from a YAML route file.
    ///
    /// On error the previous table stays in effect.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = RoutesFile::load(path)?;
        file.install(self)
            .with_context(|| format!("Invalid routes in {}", path.display()))?;
        info!(path = %path.display(), routes_count = self.len(), "Route file loaded");
        Ok(())
    }

    /// A router holding the routes of a YAML route file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let router = Router::new();
        router.load_file(path)?;
        Ok(router)
    }
}
