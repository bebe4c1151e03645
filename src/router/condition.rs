//! Condition compiler.
//!
//! Turns the raw patterns a scope is declared with (literal strings, symbols,
//! hand-written regexes) into regex source text, and replaces `:name`
//! placeholders with a generic segment capture while recording which capture
//! group each name lands in.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

/// `:name` placeholder, or `::` for an anonymous capture.
pub(crate) static SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([a-z_][a-z0-9_]*|:)").expect("valid segment regex"));

/// Capture substituted for every placeholder: one path segment, stopping at
/// the characters that usually delimit segments, formats and matrix params.
pub(crate) const SEGMENT_CAPTURE: &str = "([^/.,;?]+)";

/// A request dimension a route can be conditioned on.
///
/// The ordering (path first) is the order conditions are evaluated in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionKey {
    Path,
    Method,
    Protocol,
    Host,
    /// Any other request field, looked up by name on the [`Request`](super::Request)
    Custom(String),
}

impl ConditionKey {
    /// Map a field name onto a key; unknown names become [`ConditionKey::Custom`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "path" => ConditionKey::Path,
            "method" => ConditionKey::Method,
            "protocol" => ConditionKey::Protocol,
            "host" => ConditionKey::Host,
            other => ConditionKey::Custom(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ConditionKey::Path => "path",
            ConditionKey::Method => "method",
            ConditionKey::Protocol => "protocol",
            ConditionKey::Host => "host",
            ConditionKey::Custom(name) => name,
        }
    }
}

impl From<&str> for ConditionKey {
    fn from(name: &str) -> Self {
        ConditionKey::parse(name)
    }
}

impl fmt::Display for ConditionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw condition value as written in a route declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Matched exactly: escaped and anchored with `^...$`
    Literal(String),
    /// Anchored with `^...$` but not escaped
    Symbol(String),
    /// Used verbatim; anchors are up to the author
    Regex(String),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Pattern::Symbol(name.into())
    }

    pub fn regex(source: impl Into<String>) -> Self {
        Pattern::Regex(source.into())
    }

    #[must_use]
    pub fn is_regex(&self) -> bool {
        matches!(self, Pattern::Regex(_))
    }

    /// Regex source for this pattern. Method values are compared lower-case;
    /// hand-written method regexes are compiled case-insensitively instead.
    pub(crate) fn to_source(&self, key: &ConditionKey) -> String {
        let fold = |s: &str| {
            if *key == ConditionKey::Method {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        match self {
            Pattern::Literal(text) => format!("^{}$", regex::escape(&fold(text))),
            Pattern::Symbol(name) => format!("^{}$", fold(name)),
            Pattern::Regex(source) => source.clone(),
        }
    }

    /// Unescaped template text, when the pattern is not a hand-written regex.
    pub(crate) fn template_text(&self) -> Option<&str> {
        match self {
            Pattern::Literal(text) | Pattern::Symbol(text) => Some(text),
            Pattern::Regex(_) => None,
        }
    }
}

impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        Pattern::Literal(text.to_string())
    }
}

impl From<String> for Pattern {
    fn from(text: String) -> Self {
        Pattern::Literal(text)
    }
}

impl From<&Regex> for Pattern {
    fn from(re: &Regex) -> Self {
        Pattern::Regex(re.as_str().to_string())
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern::Regex(re.as_str().to_string())
    }
}

/// A set of conditions for one scope, keyed by dimension.
///
/// ```
/// use routeforge::router::{Conditions, Pattern};
///
/// let conditions = Conditions::new()
///     .method("post")
///     .custom("user_agent", Pattern::regex("(MSIE|Gecko)"));
/// assert_eq!(conditions.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    entries: BTreeMap<ConditionKey, Pattern>,
}

impl Conditions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path(self, pattern: impl Into<Pattern>) -> Self {
        self.with(ConditionKey::Path, pattern)
    }

    #[must_use]
    pub fn method(self, pattern: impl Into<Pattern>) -> Self {
        self.with(ConditionKey::Method, pattern)
    }

    #[must_use]
    pub fn protocol(self, pattern: impl Into<Pattern>) -> Self {
        self.with(ConditionKey::Protocol, pattern)
    }

    #[must_use]
    pub fn host(self, pattern: impl Into<Pattern>) -> Self {
        self.with(ConditionKey::Host, pattern)
    }

    #[must_use]
    pub fn custom(self, field: &str, pattern: impl Into<Pattern>) -> Self {
        self.with(ConditionKey::parse(field), pattern)
    }

    #[must_use]
    pub fn with(mut self, key: ConditionKey, pattern: impl Into<Pattern>) -> Self {
        self.entries.insert(key, pattern.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConditionKey, &Pattern)> {
        self.entries.iter()
    }
}

/// One condition after normalization and placeholder substitution.
#[derive(Debug, Clone)]
pub(crate) struct NormalizedCondition {
    /// Regex source with placeholders replaced by [`SEGMENT_CAPTURE`]
    pub source: String,
    /// Regex source before substitution (placeholders still as `:name`)
    pub original: String,
    /// Unescaped template text for literal and symbol patterns
    pub template: Option<String>,
    pub is_regex: bool,
}

/// Result of normalizing all conditions of one scope.
#[derive(Debug, Clone, Default)]
pub(crate) struct CompiledConditions {
    pub conditions: BTreeMap<ConditionKey, NormalizedCondition>,
    /// Named placeholders in declaration order: `(name, key, capture index)`.
    /// The index is local to this scope's own fragment.
    pub placeholders: Vec<(String, ConditionKey, usize)>,
    pub has_regexp: bool,
}

/// Normalize every condition and pull out its placeholders.
///
/// An empty path (`""` or `^$` once anchored) is dropped so that a scope
/// declared with `match_path("")` adds nothing to its parent's path.
pub(crate) fn compile_conditions(raw: &Conditions) -> CompiledConditions {
    let mut compiled = CompiledConditions::default();
    for (key, pattern) in raw.iter() {
        let original = pattern.to_source(key);
        if *key == ConditionKey::Path && (original.is_empty() || original == "^$") {
            continue;
        }
        if pattern.is_regex() {
            compiled.has_regexp = true;
        }
        let (source, found) = deduce_placeholders(&original);
        for (name, index) in found {
            compiled.placeholders.push((name, key.clone(), index));
        }
        compiled.conditions.insert(
            key.clone(),
            NormalizedCondition {
                source,
                original,
                template: pattern.template_text().map(str::to_string),
                is_regex: pattern.is_regex(),
            },
        );
    }
    compiled
}

/// Replace placeholders one at a time, left to right.
///
/// Each named placeholder is recorded with the 1-based capture group it
/// becomes: one more than the `(` characters before it. Escaped `\(` are
/// counted too, so a literal parenthesis ahead of a placeholder shifts its
/// index by one. Anonymous `::` captures take a group but are not recorded.
pub(crate) fn deduce_placeholders(source: &str) -> (String, Vec<(String, usize)>) {
    let mut source = source.to_string();
    let mut found = Vec::new();
    loop {
        let Some(caps) = SEGMENT.captures(&source) else {
            break;
        };
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let start = whole.start();
        let range = whole.range();
        let name = name.as_str().to_string();
        source.replace_range(range, SEGMENT_CAPTURE);
        if name != ":" {
            found.push((name, count_parens_up_to(&source, start)));
        }
    }
    (source, found)
}

/// Number of `(` in `source` up to and including byte `pos`.
pub(crate) fn count_parens_up_to(source: &str, pos: usize) -> usize {
    source
        .bytes()
        .take(pos.saturating_add(1))
        .filter(|b| *b == b'(')
        .count()
}

/// Number of capture groups a regex source contributes, by the same count.
pub(crate) fn count_captures(source: &str) -> usize {
    count_parens_up_to(source, source.len())
}

/// Join two path fragments into one regex, dropping the `$` / `^` at the seam.
pub(crate) fn concat_without_endcaps(head: Option<&str>, tail: Option<&str>) -> Option<String> {
    match (head, tail) {
        (None, None) => None,
        (Some(head), None) => Some(head.to_string()),
        (None, Some(tail)) => Some(tail.to_string()),
        (Some(head), Some(tail)) => {
            let head = head.strip_suffix('$').unwrap_or(head);
            let tail = tail.strip_prefix('^').unwrap_or(tail);
            Some(format!("{head}{tail}"))
        }
    }
}
