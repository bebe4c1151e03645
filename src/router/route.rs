//! Compiled routes.

use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::behavior::{BehaviorId, BehaviorTree};
use super::condition::{ConditionKey, SEGMENT};
use super::error::RouteError;
use super::params::{compile_param, CaptureSpace, OutputExpr};
use super::request::Request;

/// Output params of a match, by name.
pub type Params = BTreeMap<String, String>;

/// Runtime predicate of a deferred route. Returning `None` rejects the match
/// and scanning continues with the next route.
pub type DeferredFn = Arc<dyn Fn(&Request, &Params) -> Option<Params> + Send + Sync>;

/// One piece of a reversible path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone)]
pub(crate) struct OutputParam {
    pub name: String,
    pub expr: OutputExpr,
    /// Used when a capture-derived value is missing or empty
    pub default: Option<String>,
}

/// A frozen route: one regex per condition key, the output params built from
/// its captures, and (when its path is plain text) the segments used to
/// rebuild URLs.
#[derive(Clone)]
pub struct Route {
    pub(crate) index: usize,
    pub(crate) conditions: Vec<(ConditionKey, Regex)>,
    pub(crate) original_conditions: BTreeMap<ConditionKey, String>,
    pub(crate) params: Vec<OutputParam>,
    pub(crate) name: Option<String>,
    pub(crate) deferred: Option<DeferredFn>,
    pub(crate) segments: Result<Vec<Segment>, String>,
    pub(crate) has_regexp: bool,
}

impl Route {
    /// Freeze a behavior: merge its ancestry, compile every condition and
    /// output param. `defaults` apply to params whose value comes from a
    /// capture.
    pub(crate) fn from_behavior(
        tree: &BehaviorTree,
        id: BehaviorId,
        extra_params: &Params,
        defaults: &Params,
        deferred: Option<DeferredFn>,
    ) -> Result<Self, RouteError> {
        let mut merged_params = tree.merged_params(id);
        merged_params.extend(extra_params.iter().map(|(k, v)| (k.clone(), v.clone())));
        let placeholders = tree.merged_placeholders(id);

        let params = merged_params
            .iter()
            .map(|(name, template)| {
                let expr = compile_param(name, template, &placeholders)?;
                let default = if expr.is_literal() {
                    None
                } else {
                    defaults.get(name).cloned()
                };
                Ok(OutputParam {
                    name: name.clone(),
                    expr,
                    default,
                })
            })
            .collect::<Result<Vec<_>, RouteError>>()?;

        let conditions = tree
            .merged_conditions(id)
            .into_iter()
            .map(|(key, source)| {
                RegexBuilder::new(&source)
                    .case_insensitive(key == ConditionKey::Method)
                    .build()
                    .map(|re| (key.clone(), re))
                    .map_err(|e| RouteError::InvalidPattern {
                        key: key.to_string(),
                        source,
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, RouteError>>()?;

        let segments = tree
            .merged_path_template(id)
            .and_then(|template| segments_from_template(&template));

        Ok(Self {
            index: 0,
            conditions,
            original_conditions: tree.merged_original_conditions(id),
            params,
            name: None,
            deferred,
            segments,
            has_regexp: tree.has_regexp(id),
        })
    }

    /// Position in the routing table; earlier routes win.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.deferred.is_some()
    }

    /// Whether any scope of this route declared a hand-written regex.
    #[must_use]
    pub fn is_regexp(&self) -> bool {
        self.has_regexp
    }

    /// Segments for URL generation, `None` for routes that are not reversible.
    #[must_use]
    pub fn segments(&self) -> Option<&[Segment]> {
        self.segments.as_deref().ok()
    }

    /// The path template rebuilt from the segments (`/items/:id`).
    #[must_use]
    pub fn template(&self) -> Option<String> {
        self.segments().map(|segments| {
            segments
                .iter()
                .map(|s| match s {
                    Segment::Literal(text) => text.clone(),
                    Segment::Placeholder(name) => format!(":{name}"),
                })
                .collect()
        })
    }

    /// The compiled regex source for a condition key.
    #[must_use]
    pub fn condition_source(&self, key: &ConditionKey) -> Option<&str> {
        self.conditions
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, re)| re.as_str())
    }

    /// Output param templates in compiled form, by name.
    pub fn output_params(&self) -> impl Iterator<Item = (&str, &OutputExpr)> {
        self.params.iter().map(|p| (p.name.as_str(), &p.expr))
    }

    pub(crate) fn with_index(&self, index: usize) -> Self {
        let mut route = self.clone();
        route.index = index;
        route
    }

    pub(crate) fn reversibility(&self) -> Result<(), String> {
        self.segments.as_ref().map(|_| ()).map_err(Clone::clone)
    }

    /// Test every condition against the request and build the params.
    ///
    /// `None` when a condition fails or the deferred predicate declines.
    pub(crate) fn try_match(&self, request: &Request) -> Option<Params> {
        let mut captures = CaptureSpace::new();
        for (key, re) in &self.conditions {
            let caps = re.captures(request.value_for(key))?;
            captures.push(key, caps);
        }

        let mut params = Params::new();
        for param in &self.params {
            let value = match (param.expr.evaluate(&captures), &param.default) {
                (Some(v), Some(default)) if v.is_empty() => Some(default.clone()),
                (None, Some(default)) => Some(default.clone()),
                (value, _) => value,
            };
            if let Some(value) = value {
                params.insert(param.name.clone(), value);
            }
        }

        match &self.deferred {
            Some(predicate) => predicate(request, &params),
            None => Some(params),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("conditions", &self.original_conditions)
            .field("deferred", &self.deferred.is_some())
            .field("segments", &self.segments)
            .finish()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.index)?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        for (key, source) in &self.original_conditions {
            write!(f, " {key}=/{source}/")?;
        }
        f.write_str(" =>")?;
        for param in &self.params {
            write!(f, " {}: {}", param.name, param.expr)?;
        }
        if self.deferred.is_some() {
            f.write_str(" (deferred)")?;
        }
        Ok(())
    }
}

/// Split plain path text into literal runs and placeholder names.
pub(crate) fn segments_from_template(template: &str) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut last = 0;
    for caps in SEGMENT.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if name.as_str() == ":" {
            return Err("path contains an anonymous `::` capture".to_string());
        }
        if whole.start() > last {
            segments.push(Segment::Literal(template[last..whole.start()].to_string()));
        }
        segments.push(Segment::Placeholder(name.as_str().to_string()));
        last = whole.end();
    }
    if last < template.len() {
        segments.push(Segment::Literal(template[last..].to_string()));
    }
    Ok(segments)
}
