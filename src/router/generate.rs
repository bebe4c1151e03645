//! Reverse URL generation.

use std::collections::{BTreeMap, HashMap};

use super::error::RouteError;
use super::route::{Route, Segment};
use crate::query::{to_query_string, QueryMap, ToParam, Value};

/// Where URL generation reads placeholder values from.
///
/// Maps look values up by key and hand back whatever the path did not consume
/// so it can go into the query string. Records implement [`param`] as an
/// accessor, usually answering `id` and the ids of their parents.
///
/// [`param`]: ParamSource::param
pub trait ParamSource {
    /// URL token for the placeholder `name`, if this source provides one.
    fn param(&self, name: &str) -> Option<String>;

    /// Entries not consumed by the path, serialized into the query string.
    fn residual(&self, _consumed: &[&str]) -> QueryMap {
        QueryMap::new()
    }
}

impl ParamSource for QueryMap {
    fn param(&self, name: &str) -> Option<String> {
        self.get(name).map(ToParam::to_param)
    }

    fn residual(&self, consumed: &[&str]) -> QueryMap {
        self.iter()
            .filter(|(k, _)| !consumed.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl ParamSource for HashMap<String, Value> {
    fn param(&self, name: &str) -> Option<String> {
        self.get(name).map(ToParam::to_param)
    }

    fn residual(&self, consumed: &[&str]) -> QueryMap {
        self.iter()
            .filter(|(k, _)| !consumed.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl ParamSource for BTreeMap<String, String> {
    fn param(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }

    fn residual(&self, consumed: &[&str]) -> QueryMap {
        self.iter()
            .filter(|(k, _)| !consumed.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), Value::Text(v.clone())))
            .collect()
    }
}

impl<V: ToParam, const N: usize> ParamSource for [(&str, V); N] {
    fn param(&self, name: &str) -> Option<String> {
        self.iter()
            .rfind(|(k, _)| *k == name)
            .map(|(_, v)| v.to_param())
    }

    fn residual(&self, consumed: &[&str]) -> QueryMap {
        self.iter()
            .filter(|(k, _)| !consumed.contains(k))
            .map(|(k, v)| (k.to_string(), Value::Text(v.to_param())))
            .collect()
    }
}

/// Build the URL for `route`.
///
/// Placeholders read `params` first, then `fallback`; a value found in
/// neither renders empty. Duplicate slashes collapse, one trailing slash is
/// dropped, and unconsumed params are appended as a query string.
pub(crate) fn generate<P: ParamSource + ?Sized>(
    route: &Route,
    params: &P,
    fallback: &QueryMap,
) -> Result<String, RouteError> {
    let segments = route.segments().ok_or_else(|| RouteError::NotReversible {
        name: route.name().unwrap_or_default().to_string(),
        reason: route.reversibility().err().unwrap_or_default(),
    })?;

    let mut url = String::new();
    let mut consumed = Vec::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => url.push_str(text),
            Segment::Placeholder(name) => {
                consumed.push(name.as_str());
                let value = params
                    .param(name)
                    .or_else(|| fallback.get(name).map(ToParam::to_param))
                    .unwrap_or_default();
                url.push_str(&value);
            }
        }
    }

    let mut url = finish_path(&url);
    let residual = params.residual(&consumed);
    if !residual.is_empty() {
        url.push('?');
        url.push_str(&to_query_string(&residual));
    }
    Ok(url)
}

/// Collapse runs of `/` and strip one trailing slash; never returns `""`.
///
/// Runs collapse before the trailing slash goes, so `/a//` becomes `/a`
/// rather than the `/a/` that stripping first and squeezing after gives.
fn finish_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    if out.ends_with('/') {
        out.pop();
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
