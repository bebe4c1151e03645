//! Output parameter templates.
//!
//! A template such as `"admin/:controller"` or `"[1][2][3]"` compiles into an
//! [`OutputExpr`]: literal runs and references to capture groups, concatenated
//! left to right when a route matches.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

use super::condition::ConditionKey;
use super::error::RouteError;

/// Conditions carrying captures on one match before spilling to the heap.
pub const MAX_INLINE_CONDITIONS: usize = 4;

/// `:name`, `:key[N]`, or a bare `[N]` (a path capture by position).
static PARAM_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":([a-z_][a-z0-9_]*)(?:\[(\d+)\])?|\[(\d+)\]").expect("valid param token regex")
});

/// Where each named placeholder lands once all scopes are merged.
pub(crate) type PlaceholderMap = BTreeMap<String, (ConditionKey, usize)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPart {
    Literal(String),
    /// 1-based capture group of the merged regex for a condition key
    Capture(ConditionKey, usize),
}

/// Compiled output param value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputExpr {
    parts: Vec<OutputPart>,
}

impl OutputExpr {
    #[must_use]
    pub fn parts(&self) -> &[OutputPart] {
        &self.parts
    }

    /// True when no part depends on a capture.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.parts
            .iter()
            .all(|p| matches!(p, OutputPart::Literal(_)))
    }

    /// Concatenate the parts. `None` when any referenced capture did not
    /// participate in the match.
    pub(crate) fn evaluate(&self, captures: &CaptureSpace<'_, '_>) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                OutputPart::Literal(text) => out.push_str(text),
                OutputPart::Capture(key, index) => out.push_str(captures.get(key, *index)?),
            }
        }
        Some(out)
    }

    fn push_literal(&mut self, text: &str) {
        if !text.is_empty() {
            self.parts
                .push(OutputPart::Literal(text.replace("\\_", "_")));
        }
    }
}

impl fmt::Display for OutputExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.is_empty() {
            return f.write_str("\"\"");
        }
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(" + ")?;
            }
            match part {
                OutputPart::Literal(text) => write!(f, "{text:?}")?,
                OutputPart::Capture(key, index) => write!(f, "{key}[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Compile one output param template against the merged placeholders.
///
/// A backslash ends a placeholder name, and `\_` in a literal run becomes `_`,
/// so `prefix_:action\_suffix` reads the `action` capture between two literals.
pub(crate) fn compile_param(
    param: &str,
    template: &str,
    placeholders: &PlaceholderMap,
) -> Result<OutputExpr, RouteError> {
    let mut expr = OutputExpr::default();
    let mut last = 0;
    for caps in PARAM_TOKEN.captures_iter(template) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        expr.push_literal(&template[last..whole.start()]);
        last = whole.end();

        if let Some(position) = caps.get(3) {
            let index = parse_index(param, position.as_str())?;
            expr.parts.push(OutputPart::Capture(ConditionKey::Path, index));
            continue;
        }
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if let Some(position) = caps.get(2) {
            let index = parse_index(param, position.as_str())?;
            expr.parts
                .push(OutputPart::Capture(ConditionKey::parse(name), index));
            continue;
        }
        let (key, index, trailing) = resolve_placeholder(name, placeholders).ok_or_else(|| {
            RouteError::UnknownPlaceholder {
                param: param.to_string(),
                placeholder: name.to_string(),
            }
        })?;
        expr.parts.push(OutputPart::Capture(key.clone(), index));
        expr.push_literal(trailing);
    }
    expr.push_literal(&template[last..]);
    Ok(expr)
}

/// Look a placeholder up by its longest name first, then with trailing
/// underscores peeled off one by one (`:ns_:id` reads `ns` then `_`).
fn resolve_placeholder<'n, 'p>(
    name: &'n str,
    placeholders: &'p PlaceholderMap,
) -> Option<(&'p ConditionKey, usize, &'n str)> {
    let mut end = name.len();
    loop {
        if let Some((key, index)) = placeholders.get(&name[..end]) {
            return Some((key, *index, &name[end..]));
        }
        if end <= 1 || !name[..end].ends_with('_') {
            return None;
        }
        end -= 1;
    }
}

fn parse_index(param: &str, digits: &str) -> Result<usize, RouteError> {
    digits.parse().map_err(|_| {
        RouteError::InvalidOptions(format!(
            "capture index [{digits}] in param '{param}' is out of range"
        ))
    })
}

/// Captures of every condition that matched, addressed by `(key, index)`.
pub(crate) struct CaptureSpace<'k, 'h> {
    entries: SmallVec<[(&'k ConditionKey, Captures<'h>); MAX_INLINE_CONDITIONS]>,
}

impl<'k, 'h> CaptureSpace<'k, 'h> {
    pub(crate) fn new() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }

    pub(crate) fn push(&mut self, key: &'k ConditionKey, captures: Captures<'h>) {
        self.entries.push((key, captures));
    }

    pub(crate) fn get(&self, key: &ConditionKey, index: usize) -> Option<&'h str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, caps)| caps.get(index))
            .map(|m| m.as_str())
    }
}
